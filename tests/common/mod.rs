#![allow(dead_code)]

use simdag::dag::{Task, TaskKind, TaskRegistry};
use simdag::model::{AgentSpec, FunctionSpec, Model, ModelBuilder, VarType};

/// Agent `A` with variable `x:int` and a two-function linear state machine:
/// `F1 (s -> t)` then `F2 (t -> u)`, both writing `x`.
pub fn two_function_agent() -> Model {
    ModelBuilder::new()
        .agent(
            AgentSpec::new("A")
                .variable("x", VarType::Int)
                .function(FunctionSpec::new("F1", "s", "t").read_write("x"))
                .function(FunctionSpec::new("F2", "t", "u").read_write("x")),
        )
        .build()
        .expect("fixture model is valid")
}

/// Agent `A` posting message `M` in one function and reading it in the
/// next: `F_post (s -> t, posts M)`, `F_read (t -> u, reads M)`.
pub fn message_round_trip() -> Model {
    ModelBuilder::new()
        .message("M", vec![("payload", VarType::Int)])
        .agent(
            AgentSpec::new("A")
                .function(FunctionSpec::new("F_post", "s", "t").posts("M"))
                .function(FunctionSpec::new("F_read", "t", "u").reads("M")),
        )
        .build()
        .expect("fixture model is valid")
}

/// Look up the unique task with the given kind and names.
pub fn find<'r>(
    registry: &'r TaskRegistry,
    kind: TaskKind,
    parent_name: &str,
    name: &str,
) -> &'r Task {
    let mut matches = registry
        .iter()
        .filter(|t| t.kind == kind && t.parent_name == parent_name && t.name == name);
    let task = matches.next().expect("expected task exists");
    assert!(matches.next().is_none(), "task is not unique");
    task
}
