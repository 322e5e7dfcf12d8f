// src/errors.rs

//! Crate-wide error taxonomy.
//!
//! Construction-time failures (`ModelValidation`, `DependencyCycle`) abort
//! before any worker thread starts. Runtime failures are buffered by the
//! queue and drained by the scheduler at the next level barrier. Two
//! conditions are deliberately *not* recoverable errors: a duplicate task id
//! in the queue's split map and a cycle surviving into levelisation are
//! invariant breaches and panic instead.

use thiserror::Error;

use crate::dag::task::TaskId;

/// Errors surfaced from the simdag core.
#[derive(Debug, Error)]
pub enum SimError {
    /// A configuration constraint was violated (e.g. `slots < 1`).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The model failed static validation (unknown variable, unresolved
    /// message reference, duplicate name, ...).
    #[error("model validation failed: {0}")]
    ModelValidation(String),

    /// The dependency graph contains a cycle. Carries the ids of one
    /// offending cycle as a witness.
    #[error("dependency cycle through tasks {cycle:?}")]
    DependencyCycle { cycle: Vec<TaskId> },

    /// The splitting queue was handed an id it already holds a splitter for.
    /// Only ever used to format the panic message; see the queue.
    #[error("task id conflict: task {task_id} already has an active splitter")]
    TaskIdConflict { task_id: TaskId },

    /// A population document references unknown agents/variables or carries
    /// a value that cannot be cast to the declared variable type.
    #[error("invalid population: {0}")]
    InvalidPopulation(String),

    /// The underlying I/O sink failed.
    #[error("i/o failure: {source}")]
    IoFailure {
        #[from]
        source: std::io::Error,
    },

    /// A task body reported failure (or panicked) on a worker thread.
    #[error("task {task_id} failed: {message}")]
    TaskExecutionFailed { task_id: TaskId, message: String },
}

/// Convenience alias for fallible core operations.
pub type SimResult<T> = std::result::Result<T, SimError>;
