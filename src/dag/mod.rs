// src/dag/mod.rs

//! The dependency graph over scheduled work: task and edge types, the
//! arena-style registry that owns every task, graph construction from a
//! validated model, levelisation, and diagnostic output.

pub mod build;
pub mod dot;
pub mod level;
pub mod registry;
pub mod task;

pub use build::{build_graph, TaskGraph};
pub use level::{assign_levels, format_task_list, ordered_task_list};
pub use registry::TaskRegistry;
pub use task::{DepKind, Dependency, Task, TaskId, TaskKind, TERM_TASK_ID};
