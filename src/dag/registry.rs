// src/dag/registry.rs

//! Arena ownership of every task.
//!
//! Tasks are owned exclusively by the registry; everyone else holds dense
//! ids. Edges refer to parents by id, which keeps the graph free of
//! ownership cycles and trivially serialisable for diagnostics.

use crate::dag::task::{Task, TaskId, TERM_TASK_ID};

#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Vec<Task>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `task` and assign it the next dense id.
    pub fn register(&mut self, mut task: Task) -> TaskId {
        let id = self.tasks.len();
        assert_ne!(id, TERM_TASK_ID, "task id space exhausted");
        task.id = id;
        self.tasks.push(task);
        id
    }

    /// Look up a task. Total on every id this registry issued; anything
    /// else is a programming error.
    pub fn get(&self, id: TaskId) -> &Task {
        self.tasks.get(id).expect("unknown task id")
    }

    pub fn get_mut(&mut self, id: TaskId) -> &mut Task {
        self.tasks.get_mut(id).expect("unknown task id")
    }

    /// The shutdown sentinel. Never a real task.
    pub fn term_id(&self) -> TaskId {
        TERM_TASK_ID
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Task> {
        self.tasks.iter_mut()
    }

    /// All issued ids, in registration order.
    pub fn ids(&self) -> impl Iterator<Item = TaskId> {
        0..self.tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::task::TaskKind;

    #[test]
    fn ids_are_dense_and_stable() {
        let mut reg = TaskRegistry::new();
        let a = reg.register(Task::new(TaskKind::AgentFunction, "A", "f"));
        let b = reg.register(Task::new(TaskKind::SyncStart, "M", "sync_start"));
        assert_eq!((a, b), (0, 1));
        assert_eq!(reg.get(a).name, "f");
        assert_eq!(reg.get(b).kind, TaskKind::SyncStart);
        assert_ne!(reg.term_id(), a);
        assert_ne!(reg.term_id(), b);
    }

    #[test]
    #[should_panic(expected = "unknown task id")]
    fn unknown_id_panics() {
        let reg = TaskRegistry::new();
        let _ = reg.get(7);
    }
}
