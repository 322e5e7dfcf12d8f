// src/config/mod.rs

//! Model and runtime configuration from TOML files.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    AgentSection, ConfigFile, FunctionSection, MessageSection, OutputSection, RuntimeSection,
    VariableSection,
};
pub use validate::validate_config;
