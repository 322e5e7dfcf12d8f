// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::dag::TaskKind;
use crate::engine::{ExecOptions, DEFAULT_MIN_VECTOR_SIZE};
use crate::errors::{SimError, SimResult};
use crate::model::{AgentSpec, FunctionSpec, Model, ModelBuilder, VarType};

/// Top-level configuration as read from a TOML file.
///
/// A model plus runtime options, directly mapping a document like:
///
/// ```toml
/// [runtime]
/// slots = 4
/// iterations = 10
///
/// [output]
/// prefix = "out/pop_"
///
/// [agent.Circle]
/// [[agent.Circle.variable]]
/// name = "x"
/// type = "double"
///
/// [[agent.Circle.function]]
/// name = "move"
/// current_state = "start"
/// next_state = "end"
/// read_write = ["x"]
/// posts = ["location"]
///
/// [message.location]
/// [[message.location.variable]]
/// name = "x"
/// type = "double"
/// ```
///
/// All sections are optional and have reasonable defaults, except that a
/// usable model needs at least one agent.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    /// Executor options from `[runtime]`.
    #[serde(default)]
    pub runtime: RuntimeSection,

    /// Population output options from `[output]`.
    #[serde(default)]
    pub output: OutputSection,

    /// All agents from `[agent.<name>]`. Keys are the agent names.
    #[serde(default)]
    pub agent: BTreeMap<String, AgentSection>,

    /// All message types from `[message.<name>]`.
    #[serde(default)]
    pub message: BTreeMap<String, MessageSection>,
}

/// `[runtime]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeSection {
    /// Worker thread count, >= 1.
    #[serde(default = "default_slots")]
    pub slots: usize,

    /// Upper bound on sub-tasks per split task; defaults to the worker
    /// count when unset.
    #[serde(default)]
    pub max_splits: Option<usize>,

    /// Minimum rows per sub-task, >= 1.
    #[serde(default = "default_min_vector_size")]
    pub min_vector_size: usize,

    /// Iterations to run when the CLI does not override it.
    #[serde(default = "default_iterations")]
    pub iterations: usize,

    /// Task kinds eligible for splitting, e.g. `["agent_function"]`.
    /// Defaults to agent functions only.
    #[serde(default)]
    pub splittable: Option<Vec<String>>,
}

fn default_slots() -> usize {
    1
}

fn default_min_vector_size() -> usize {
    DEFAULT_MIN_VECTOR_SIZE
}

fn default_iterations() -> usize {
    1
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            slots: default_slots(),
            max_splits: None,
            min_vector_size: default_min_vector_size(),
            iterations: default_iterations(),
            splittable: None,
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct OutputSection {
    /// Prefix for population documents; iteration `k` lands in
    /// `<prefix><k>.xml`. Unset disables population output.
    #[serde(default)]
    pub prefix: Option<String>,
}

/// `[agent.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AgentSection {
    /// Memory variables, `[[agent.<name>.variable]]`, in declaration order.
    #[serde(default)]
    pub variable: Vec<VariableSection>,

    /// Transition functions, `[[agent.<name>.function]]`, in state-machine
    /// order.
    #[serde(default)]
    pub function: Vec<FunctionSection>,
}

/// One variable declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct VariableSection {
    pub name: String,

    /// `"int"`, `"double"`, or `"string"`.
    #[serde(rename = "type", default = "default_var_type")]
    pub ty: String,
}

fn default_var_type() -> String {
    "string".to_string()
}

/// One transition function declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionSection {
    pub name: String,
    pub current_state: String,
    pub next_state: String,

    /// Messages the function iterates.
    #[serde(default)]
    pub reads: Vec<String>,

    /// Messages the function posts.
    #[serde(default)]
    pub posts: Vec<String>,

    /// Variables readable but not writable.
    #[serde(default)]
    pub read_only: Vec<String>,

    /// Variables readable and writable.
    #[serde(default)]
    pub read_write: Vec<String>,
}

/// `[message.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MessageSection {
    #[serde(default)]
    pub variable: Vec<VariableSection>,
}

impl ConfigFile {
    /// Build the validated model this config describes.
    pub fn to_model(&self) -> SimResult<Model> {
        let mut builder = ModelBuilder::new();

        for (name, message) in &self.message {
            let vars = parse_variables(&message.variable, &format!("message '{name}'"))?;
            builder = builder.message(
                name,
                vars.iter().map(|(n, ty)| (n.as_str(), *ty)).collect(),
            );
        }

        for (name, agent) in &self.agent {
            let mut spec = AgentSpec::new(name);
            for (var_name, ty) in parse_variables(&agent.variable, &format!("agent '{name}'"))? {
                spec = spec.variable(&var_name, ty);
            }
            for function in &agent.function {
                let mut fspec = FunctionSpec::new(
                    &function.name,
                    &function.current_state,
                    &function.next_state,
                );
                for message in &function.reads {
                    fspec = fspec.reads(message);
                }
                for message in &function.posts {
                    fspec = fspec.posts(message);
                }
                for var in &function.read_only {
                    fspec = fspec.read_only(var);
                }
                for var in &function.read_write {
                    fspec = fspec.read_write(var);
                }
                spec = spec.function(fspec);
            }
            builder = builder.agent(spec);
        }

        builder.build()
    }

    /// Build validated executor options, optionally overriding the worker
    /// count (e.g. from the CLI).
    pub fn exec_options(&self, slots_override: Option<usize>) -> SimResult<ExecOptions> {
        let slots = slots_override.unwrap_or(self.runtime.slots);
        let mut options = ExecOptions::new(slots)?
            .with_min_vector_size(self.runtime.min_vector_size)?;
        if let Some(max_splits) = self.runtime.max_splits {
            options = options.with_max_splits(max_splits)?;
        }
        if let Some(kinds) = &self.runtime.splittable {
            options.splittable.clear();
            for kind in kinds {
                options = options.with_splittable(parse_task_kind(kind)?);
            }
        }
        Ok(options)
    }
}

fn parse_task_kind(s: &str) -> SimResult<TaskKind> {
    match s {
        "agent_function" => Ok(TaskKind::AgentFunction),
        "sync_start" => Ok(TaskKind::SyncStart),
        "sync_finish" => Ok(TaskKind::SyncFinish),
        "io_pop_write" => Ok(TaskKind::IoPopWrite),
        other => Err(SimError::InvalidArgument(format!(
            "unknown splittable task kind '{other}'"
        ))),
    }
}

fn parse_variables(
    sections: &[VariableSection],
    owner: &str,
) -> SimResult<Vec<(String, VarType)>> {
    sections
        .iter()
        .map(|section| {
            VarType::from_decl(&section.ty)
                .map(|ty| (section.name.clone(), ty))
                .ok_or_else(|| {
                    SimError::ModelValidation(format!(
                        "{owner} variable '{}' has unknown type '{}'",
                        section.name, section.ty
                    ))
                })
        })
        .collect()
}
