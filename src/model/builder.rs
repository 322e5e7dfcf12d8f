// src/model/builder.rs

//! Programmatic model construction with validation.
//!
//! The builder is the embedding API's way of declaring a model; the TOML
//! config path in [`crate::config`] funnels into the same builder so both
//! routes share one validation pass.

use std::collections::BTreeSet;

use crate::errors::{SimError, SimResult};
use crate::model::{Agent, AgentFunction, Message, Model, VarDecl, VarType};

/// Declares one transition function of an agent.
#[derive(Debug, Clone)]
pub struct FunctionSpec {
    func: AgentFunction,
}

impl FunctionSpec {
    pub fn new(name: &str, current_state: &str, next_state: &str) -> Self {
        Self {
            func: AgentFunction {
                name: name.to_string(),
                current_state: current_state.to_string(),
                next_state: next_state.to_string(),
                reads: Vec::new(),
                posts: Vec::new(),
                read_only_vars: Vec::new(),
                read_write_vars: Vec::new(),
            },
        }
    }

    /// Declare a message this function reads.
    pub fn reads(mut self, message: &str) -> Self {
        self.func.reads.push(message.to_string());
        self
    }

    /// Declare a message this function posts.
    pub fn posts(mut self, message: &str) -> Self {
        self.func.posts.push(message.to_string());
        self
    }

    /// Declare read-only access to an agent variable.
    pub fn read_only(mut self, var: &str) -> Self {
        self.func.read_only_vars.push(var.to_string());
        self
    }

    /// Declare read-write access to an agent variable.
    pub fn read_write(mut self, var: &str) -> Self {
        self.func.read_write_vars.push(var.to_string());
        self
    }
}

/// Declares one agent kind.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    agent: Agent,
}

impl AgentSpec {
    pub fn new(name: &str) -> Self {
        Self {
            agent: Agent {
                name: name.to_string(),
                variables: Vec::new(),
                functions: Vec::new(),
            },
        }
    }

    /// Add a memory variable. Declaration order is preserved and is
    /// significant both for population output and for the data-dependency
    /// fallback rule.
    pub fn variable(mut self, name: &str, ty: VarType) -> Self {
        self.agent.variables.push(VarDecl {
            name: name.to_string(),
            ty,
        });
        self
    }

    /// Add a transition function. Declaration order is the state-machine
    /// order used when choosing the last writer of a variable.
    pub fn function(mut self, spec: FunctionSpec) -> Self {
        self.agent.functions.push(spec.func);
        self
    }
}

/// Builds and validates a [`Model`].
#[derive(Debug, Default)]
pub struct ModelBuilder {
    agents: Vec<Agent>,
    messages: Vec<Message>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a message type with its field schema.
    pub fn message(mut self, name: &str, variables: Vec<(&str, VarType)>) -> Self {
        self.messages.push(Message {
            name: name.to_string(),
            variables: variables
                .into_iter()
                .map(|(n, ty)| VarDecl {
                    name: n.to_string(),
                    ty,
                })
                .collect(),
        });
        self
    }

    /// Declare an agent kind.
    pub fn agent(mut self, spec: AgentSpec) -> Self {
        self.agents.push(spec.agent);
        self
    }

    /// Validate everything and produce the model.
    ///
    /// # Errors
    /// `ModelValidation` on duplicate names, empty models, agents without
    /// functions, or dangling variable/message references.
    pub fn build(self) -> SimResult<Model> {
        if self.agents.is_empty() {
            return Err(SimError::ModelValidation(
                "model must declare at least one agent".to_string(),
            ));
        }

        let mut message_names = BTreeSet::new();
        for message in &self.messages {
            if !message_names.insert(message.name.as_str()) {
                return Err(SimError::ModelValidation(format!(
                    "duplicate message '{}'",
                    message.name
                )));
            }
            check_unique_vars(&message.variables, &format!("message '{}'", message.name))?;
        }

        let mut agent_names = BTreeSet::new();
        for agent in &self.agents {
            if !agent_names.insert(agent.name.as_str()) {
                return Err(SimError::ModelValidation(format!(
                    "duplicate agent '{}'",
                    agent.name
                )));
            }
            check_unique_vars(&agent.variables, &format!("agent '{}'", agent.name))?;

            if agent.functions.is_empty() {
                return Err(SimError::ModelValidation(format!(
                    "agent '{}' declares no functions",
                    agent.name
                )));
            }

            let mut function_names = BTreeSet::new();
            for func in &agent.functions {
                if !function_names.insert(func.name.as_str()) {
                    return Err(SimError::ModelValidation(format!(
                        "agent '{}' declares function '{}' twice",
                        agent.name, func.name
                    )));
                }

                for var in func.read_only_vars.iter().chain(&func.read_write_vars) {
                    if agent.variable(var).is_none() {
                        return Err(SimError::ModelValidation(format!(
                            "function '{}/{}' references unknown variable '{}'",
                            agent.name, func.name, var
                        )));
                    }
                }
                for msg in func.reads.iter().chain(&func.posts) {
                    if !message_names.contains(msg.as_str()) {
                        return Err(SimError::ModelValidation(format!(
                            "function '{}/{}' references unknown message '{}'",
                            agent.name, func.name, msg
                        )));
                    }
                }
            }
        }

        Ok(Model {
            agents: self.agents,
            messages: self.messages,
        })
    }
}

fn check_unique_vars(vars: &[VarDecl], owner: &str) -> SimResult<()> {
    let mut seen = BTreeSet::new();
    for var in vars {
        if !seen.insert(var.name.as_str()) {
            return Err(SimError::ModelValidation(format!(
                "{owner} declares variable '{}' twice",
                var.name
            )));
        }
    }
    Ok(())
}
