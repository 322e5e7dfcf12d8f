// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::ConfigFile;
use crate::config::validate::validate_config;
use crate::errors::{SimError, SimResult};

/// Load a configuration file from a given path and return the raw
/// `ConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform
/// semantic validation (dangling references, cycles, runtime constraints).
/// Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> SimResult<ConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: ConfigFile = toml::from_str(&contents).map_err(|e| {
        SimError::ModelValidation(format!("parsing TOML config from {path:?}: {e}"))
    })?;

    Ok(config)
}

/// Load a configuration file from path and run full validation.
///
/// This is the recommended entry point for the rest of the application:
/// a returned config is known to describe a valid model (references
/// resolve, no duplicate names, the dependency graph is acyclic) and valid
/// runtime options.
pub fn load_and_validate(path: impl AsRef<Path>) -> SimResult<ConfigFile> {
    let config = load_from_path(&path)?;
    validate_config(&config)?;
    Ok(config)
}

/// Resolve the default config path: `Model.toml` in the current working
/// directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Model.toml")
}
