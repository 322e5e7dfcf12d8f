// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `simdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "simdag",
    version,
    about = "Run agent-based simulations over a dependency-scheduled task graph.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the model file (TOML).
    ///
    /// Default: `Model.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Model.toml")]
    pub model: String,

    /// Population XML to load before the first iteration.
    #[arg(long, value_name = "PATH")]
    pub pop: Option<String>,

    /// Number of iterations to run (overrides `[runtime].iterations`).
    #[arg(long, value_name = "N")]
    pub iterations: Option<usize>,

    /// Worker thread count (overrides `[runtime].slots`).
    #[arg(long, value_name = "N")]
    pub slots: Option<usize>,

    /// Prefix for population output files (overrides `[output].prefix`).
    #[arg(long, value_name = "PREFIX")]
    pub output_prefix: Option<String>,

    /// Write the dependency graph as Graphviz dot to this path.
    #[arg(long, value_name = "PATH")]
    pub dump_graph: Option<String>,

    /// Write the population XSD to this path and exit.
    #[arg(long, value_name = "PATH")]
    pub emit_schema: Option<String>,

    /// Parse + validate, print the levelled task list, but don't execute.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SIMDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
