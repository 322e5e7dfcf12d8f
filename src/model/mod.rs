// src/model/mod.rs

//! The validated in-memory model: agents with typed memory variables and a
//! state machine of functions, plus the message types they exchange.
//!
//! A [`Model`] can only be obtained through [`ModelBuilder`], which performs
//! all static validation. The rest of the crate treats the model as
//! read-only for the lifetime of a run.

pub mod builder;

pub use builder::{AgentSpec, FunctionSpec, ModelBuilder};

use std::fmt;

use serde::Deserialize;

/// Type of an agent or message variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarType {
    Int,
    Double,
    /// Catch-all for anything that is not numeric.
    #[serde(alias = "str")]
    String,
}

impl VarType {
    /// Parse a declaration string as used in config files.
    pub fn from_decl(s: &str) -> Option<VarType> {
        match s {
            "int" => Some(VarType::Int),
            "double" => Some(VarType::Double),
            "string" | "str" => Some(VarType::String),
            _ => None,
        }
    }

    /// The XSD type this variable maps to in the generated schema.
    pub fn xsd_type(self) -> &'static str {
        match self {
            VarType::Int => "xs:integer",
            VarType::Double => "xs:double",
            VarType::String => "xs:string",
        }
    }

    /// The default value a row gets when a population document omits the
    /// variable.
    pub fn default_value(self) -> Value {
        match self {
            VarType::Int => Value::Int(0),
            VarType::Double => Value::Double(0.0),
            VarType::String => Value::String(String::new()),
        }
    }

    /// Cast a population text value to this type.
    pub fn parse_value(self, text: &str) -> Option<Value> {
        match self {
            VarType::Int => text.trim().parse::<i64>().ok().map(Value::Int),
            VarType::Double => text.trim().parse::<f64>().ok().map(Value::Double),
            VarType::String => Some(Value::String(text.to_string())),
        }
    }
}

/// A single memory or message field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Double(f64),
    String(String),
}

impl Value {
    pub fn var_type(&self) -> VarType {
        match self {
            Value::Int(_) => VarType::Int,
            Value::Double(_) => VarType::Double,
            Value::String(_) => VarType::String,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
        }
    }
}

/// A named, typed variable declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDecl {
    pub name: String,
    pub ty: VarType,
}

/// One transition function of an agent's state machine, with its declared
/// memory and message accesses.
#[derive(Debug, Clone)]
pub struct AgentFunction {
    pub name: String,
    pub current_state: String,
    pub next_state: String,
    /// Messages this function iterates in their read phase.
    pub reads: Vec<String>,
    /// Messages this function posts to.
    pub posts: Vec<String>,
    /// Variables the function may read but never write.
    pub read_only_vars: Vec<String>,
    /// Variables the function may read and write.
    pub read_write_vars: Vec<String>,
}

impl AgentFunction {
    /// Whether the function declares write access to `var`.
    pub fn writes(&self, var: &str) -> bool {
        self.read_write_vars.iter().any(|v| v == var)
    }
}

/// A kind of agent: typed memory columns plus an ordered list of functions.
#[derive(Debug, Clone)]
pub struct Agent {
    pub name: String,
    pub variables: Vec<VarDecl>,
    pub functions: Vec<AgentFunction>,
}

impl Agent {
    pub fn variable(&self, name: &str) -> Option<&VarDecl> {
        self.variables.iter().find(|v| v.name == name)
    }
}

/// A message type with its field schema.
#[derive(Debug, Clone)]
pub struct Message {
    pub name: String,
    pub variables: Vec<VarDecl>,
}

/// A fully validated model. Construct via [`ModelBuilder`].
#[derive(Debug, Clone)]
pub struct Model {
    pub(crate) agents: Vec<Agent>,
    pub(crate) messages: Vec<Message>,
}

impl Model {
    /// All agents, in declaration order.
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// All message types, in declaration order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn agent(&self, name: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.name == name)
    }

    pub fn message(&self, name: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.name == name)
    }
}
