mod common;

use std::collections::BTreeMap;

use common::two_function_agent;
use simdag::engine::{ExecOptions, RowVerdict};
use simdag::errors::SimError;
use simdag::model::{AgentSpec, FunctionSpec, Model, ModelBuilder, Value, VarType};
use simdag::sim::Simulation;

fn seed_rows(sim: &Simulation, agent: &str, xs: impl IntoIterator<Item = i64>) {
    let store = sim.store(agent).expect("agent store exists");
    for x in xs {
        store
            .push_row(&BTreeMap::from([("x".to_string(), Value::Int(x))]))
            .unwrap();
    }
}

fn column_ints(sim: &Simulation, agent: &str, var: &str) -> Vec<i64> {
    sim.store(agent)
        .unwrap()
        .column(var)
        .unwrap()
        .into_iter()
        .map(|v| v.as_int().unwrap())
        .collect()
}

/// `F1` increments, `F2` doubles; registered on both runs.
fn arithmetic_sim(rows: i64) -> Simulation {
    let mut sim = Simulation::new(two_function_agent());
    sim.register_agent_function("F1", |view, _boards| {
        let x = view.get_int("x")?;
        view.set_int("x", x + 1)?;
        Ok(RowVerdict::Alive)
    })
    .unwrap();
    sim.register_agent_function("F2", |view, _boards| {
        let x = view.get_int("x")?;
        view.set_int("x", x * 2)?;
        Ok(RowVerdict::Alive)
    })
    .unwrap();
    seed_rows(&sim, "A", 0..rows);
    sim
}

#[test]
fn single_and_multi_worker_runs_agree() {
    let mut serial = arithmetic_sim(64);
    serial.run(1, 1).unwrap();

    let mut parallel = arithmetic_sim(64);
    let options = ExecOptions::new(4)
        .unwrap()
        .with_min_vector_size(8)
        .unwrap();
    parallel.run_with_options(1, &options).unwrap();

    let expected: Vec<i64> = (0..64).map(|x| (x + 1) * 2).collect();
    assert_eq!(column_ints(&serial, "A", "x"), expected);
    assert_eq!(column_ints(&parallel, "A", "x"), expected);
}

fn culling_model() -> Model {
    ModelBuilder::new()
        .agent(
            AgentSpec::new("A")
                .variable("x", VarType::Int)
                .function(FunctionSpec::new("cull", "s", "t").read_write("x")),
        )
        .build()
        .unwrap()
}

fn culling_sim(rows: i64) -> Simulation {
    let mut sim = Simulation::new(culling_model());
    sim.register_agent_function("cull", |view, _boards| {
        let x = view.get_int("x")?;
        if x % 3 == 0 {
            return Ok(RowVerdict::Dead);
        }
        view.set_int("x", x + 10)?;
        Ok(RowVerdict::Alive)
    })
    .unwrap();
    seed_rows(&sim, "A", 0..rows);
    sim
}

#[test]
fn splitting_does_not_change_verdicts() {
    let mut whole = culling_sim(90);
    let whole_options = ExecOptions::new(4)
        .unwrap()
        .with_max_splits(1)
        .unwrap()
        .with_min_vector_size(1)
        .unwrap();
    whole.run_with_options(1, &whole_options).unwrap();

    let mut split = culling_sim(90);
    let split_options = ExecOptions::new(4)
        .unwrap()
        .with_max_splits(8)
        .unwrap()
        .with_min_vector_size(1)
        .unwrap();
    split.run_with_options(1, &split_options).unwrap();

    // Every x divisible by three died; survivors gained ten.
    let expected: Vec<i64> = (0..90).filter(|x| x % 3 != 0).map(|x| x + 10).collect();
    assert_eq!(column_ints(&whole, "A", "x"), expected);
    assert_eq!(column_ints(&split, "A", "x"), expected);
    assert_eq!(whole.store("A").unwrap().rows(), 60);
    assert_eq!(split.store("A").unwrap().rows(), 60);
}

#[test]
fn messages_flow_from_posters_to_readers() {
    let model = ModelBuilder::new()
        .message("M", vec![("payload", VarType::Int)])
        .agent(
            AgentSpec::new("A")
                .variable("x", VarType::Int)
                .function(FunctionSpec::new("shout", "s", "t").read_only("x").posts("M"))
                .function(FunctionSpec::new("tally", "t", "u").read_write("x").reads("M")),
        )
        .build()
        .unwrap();

    let mut sim = Simulation::new(model);
    sim.register_agent_function("shout", |view, boards| {
        let x = view.get_int("x")?;
        boards.post("M", vec![Value::Int(x)])?;
        Ok(RowVerdict::Alive)
    })
    .unwrap();
    sim.register_agent_function("tally", |view, boards| {
        let mut sum = 0;
        for row in boards.read("M")?.iter() {
            sum += row[0].as_int().unwrap();
        }
        view.set_int("x", sum)?;
        Ok(RowVerdict::Alive)
    })
    .unwrap();
    seed_rows(&sim, "A", [1, 2, 3]);

    sim.run(1, 2).unwrap();

    // Every reader observed every posted message: 1 + 2 + 3.
    assert_eq!(column_ints(&sim, "A", "x"), vec![6, 6, 6]);
}

#[test]
fn boards_are_cleared_between_iterations() {
    let model = ModelBuilder::new()
        .message("M", vec![("payload", VarType::Int)])
        .agent(
            AgentSpec::new("A")
                .variable("x", VarType::Int)
                .function(FunctionSpec::new("shout", "s", "t").posts("M"))
                .function(FunctionSpec::new("tally", "t", "u").read_write("x").reads("M")),
        )
        .build()
        .unwrap();

    let mut sim = Simulation::new(model);
    sim.register_agent_function("shout", |_view, boards| {
        boards.post("M", vec![Value::Int(1)])?;
        Ok(RowVerdict::Alive)
    })
    .unwrap();
    sim.register_agent_function("tally", |view, boards| {
        view.set_int("x", boards.read("M")?.len() as i64)?;
        Ok(RowVerdict::Alive)
    })
    .unwrap();
    seed_rows(&sim, "A", [0, 0]);

    // Two rows post one message each, every iteration afresh.
    sim.run(3, 2).unwrap();
    assert_eq!(column_ints(&sim, "A", "x"), vec![2, 2]);
}

#[test]
fn unregistered_functions_are_identity_transitions() {
    let mut sim = Simulation::new(two_function_agent());
    seed_rows(&sim, "A", [5, 6]);
    sim.run(2, 2).unwrap();
    assert_eq!(column_ints(&sim, "A", "x"), vec![5, 6]);
}

#[test]
fn callback_errors_become_task_execution_failures() {
    let mut sim = Simulation::new(two_function_agent());
    sim.register_agent_function("F1", |_view, _boards| anyhow::bail!("callback exploded"))
        .unwrap();
    seed_rows(&sim, "A", [1]);

    let err = sim.run(1, 2).unwrap_err();
    match err {
        SimError::TaskExecutionFailed { message, .. } => {
            assert!(message.contains("callback exploded"));
        }
        other => panic!("expected TaskExecutionFailed, got {other:?}"),
    }
}

#[test]
fn registering_an_unknown_function_is_rejected() {
    let mut sim = Simulation::new(two_function_agent());
    let err = sim
        .register_agent_function("nope", |_v, _b| Ok(RowVerdict::Alive))
        .unwrap_err();
    assert!(matches!(err, SimError::ModelValidation(_)));
}
