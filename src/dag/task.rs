// src/dag/task.rs

use std::collections::BTreeSet;

/// Dense index of a task in the [`TaskRegistry`](crate::dag::TaskRegistry).
pub type TaskId = usize;

/// Reserved sentinel id that tells a worker to shut down. Never registered.
pub const TERM_TASK_ID: TaskId = usize::MAX;

/// What a task does when executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskKind {
    /// Run one agent function over the agent's live rows.
    AgentFunction,
    /// Freeze a message board's posted buffer for reading.
    SyncStart,
    /// Clear a message board's read buffer and reopen it for posting.
    SyncFinish,
    /// Serialise one agent variable's column to the configured sink.
    IoPopWrite,
    /// Evaluate a transition condition.
    Condition,
    ModelStart,
    ModelFinish,
}

impl TaskKind {
    /// Priority bias used for tie-breaking within a level. Lower executes
    /// later within the level.
    pub fn default_priority(self) -> usize {
        match self {
            TaskKind::SyncStart => 10,
            TaskKind::AgentFunction => 5,
            TaskKind::SyncFinish => 1,
            TaskKind::IoPopWrite => 0,
            _ => 10,
        }
    }

    /// Short tag used by the task-list diagnostic.
    pub fn diagnostic_tag(self) -> &'static str {
        match self {
            TaskKind::IoPopWrite => "disk",
            TaskKind::SyncStart | TaskKind::SyncFinish => "comm",
            TaskKind::AgentFunction => "func",
            _ => "",
        }
    }
}

/// What gave rise to a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepKind {
    State,
    Communication,
    Data,
    Condition,
}

impl DepKind {
    /// Label prefix used in the Graphviz dump.
    pub fn dot_prefix(self) -> &'static str {
        match self {
            DepKind::Communication => "Message",
            DepKind::Data => "Memory",
            DepKind::State => "State",
            DepKind::Condition => "Condition",
        }
    }
}

/// A directed edge from a child task to one of its parents: the child may
/// not run before the parent has completed.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub kind: DepKind,
    /// The state, message, or variable name that gives rise to the edge.
    pub label: String,
    pub parent: TaskId,
}

/// One schedulable unit of work.
#[derive(Debug, Clone)]
pub struct Task {
    /// Dense id, assigned by the registry at registration.
    pub id: TaskId,
    pub kind: TaskKind,
    /// Agent name for agent and data tasks, message name for sync tasks.
    pub parent_name: String,
    /// Function name, variable name, or the literal `sync_start` /
    /// `sync_finish`.
    pub name: String,
    /// Stratum in the DAG. 0 means unassigned.
    pub level: usize,
    pub priority: usize,
    pub read_only_vars: BTreeSet<String>,
    /// All variables the task may read (read-only plus read-write).
    pub read_vars: BTreeSet<String>,
    pub write_vars: BTreeSet<String>,
    pub reads_msgs: BTreeSet<String>,
    pub posts_msgs: BTreeSet<String>,
    /// Edges to parent tasks, in insertion order.
    pub dependencies: Vec<Dependency>,
}

impl Task {
    pub fn new(kind: TaskKind, parent_name: &str, name: &str) -> Self {
        Self {
            id: TERM_TASK_ID,
            kind,
            parent_name: parent_name.to_string(),
            name: name.to_string(),
            level: 0,
            priority: kind.default_priority(),
            read_only_vars: BTreeSet::new(),
            read_vars: BTreeSet::new(),
            write_vars: BTreeSet::new(),
            reads_msgs: BTreeSet::new(),
            posts_msgs: BTreeSet::new(),
            dependencies: Vec::new(),
        }
    }

    /// The `parent_name`-qualified label used in diagnostics.
    pub fn label(&self) -> String {
        format!("{}_{}", self.parent_name, self.name)
    }

    pub fn add_dependency(&mut self, kind: DepKind, label: &str, parent: TaskId) {
        self.dependencies.push(Dependency {
            kind,
            label: label.to_string(),
            parent,
        });
    }

    /// Whether this task has an edge to `parent`.
    pub fn depends_on(&self, parent: TaskId) -> bool {
        self.dependencies.iter().any(|d| d.parent == parent)
    }
}
