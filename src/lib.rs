// src/lib.rs

//! simdag: a dependency-aware task-graph runtime for agent-based
//! simulation.
//!
//! A model of agents (state machines over typed memory columns) and
//! message boards is turned into a DAG of tasks: one per agent function,
//! a sync pair per message board, and one disk-write task per agent
//! variable. The DAG is stratified into levels and executed level by level
//! on a fixed pool of worker threads; data-parallel tasks are split into
//! sub-tasks whose completion aggregates before downstream levels run.

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod io;
pub mod logging;
pub mod model;
pub mod sim;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::sim::Simulation;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and validation
/// - graph construction, levelisation and diagnostics
/// - population input/output
/// - the simulation run itself
pub fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.model);
    let cfg = load_and_validate(&config_path)?;
    let model = cfg.to_model()?;

    if let Some(path) = &args.emit_schema {
        fs::write(path, io::generate_schema(&model))?;
        info!(path = %path, "population schema written");
        return Ok(());
    }

    let graph = dag::build_graph(&model)?;
    let mut registry = graph.registry;
    dag::assign_levels(&mut registry);
    let ordered = dag::ordered_task_list(&registry);

    if let Some(path) = &args.dump_graph {
        fs::write(path, dag::dot::write_dot(&registry))?;
        info!(path = %path, "dependency graph written");
    }

    if args.dry_run {
        print!("{}", dag::format_task_list(&registry, &ordered));
        debug!("dry-run complete (no execution)");
        return Ok(());
    }

    let options = cfg.exec_options(args.slots)?;
    let iterations = args.iterations.unwrap_or(cfg.runtime.iterations);

    let mut sim = Simulation::new(model);
    if let Some(pop) = &args.pop {
        sim.load_population(Path::new(pop))?;
    }
    if let Some(prefix) = args.output_prefix.clone().or_else(|| cfg.output.prefix.clone()) {
        sim.set_output_prefix(prefix);
    }

    sim.run_with_options(iterations, &options)?;
    info!(iterations, "run complete");
    Ok(())
}
