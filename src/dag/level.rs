// src/dag/level.rs

//! Levelisation (C2): stratify the DAG into levels by fixed-point
//! relaxation and produce the ordered task list the scheduler consumes.

use tracing::debug;

use crate::dag::registry::TaskRegistry;
use crate::dag::task::TaskId;

/// Assign every task its level: leaves at 1, every child strictly above the
/// highest of its parents.
///
/// # Panics
/// When a full pass assigns nothing while unlevelled tasks remain. Graph
/// construction has already rejected cycles, so reaching this is an
/// invariant breach, not a user error.
pub fn assign_levels(registry: &mut TaskRegistry) {
    for task in registry.iter_mut() {
        task.level = 0;
    }

    let mut remaining = registry.len();
    let mut current_level = 1usize;
    while remaining > 0 {
        // Decide first, then mutate: a task assigned in this pass must not
        // unlock its children until the next pass.
        let ready: Vec<TaskId> = registry
            .ids()
            .filter(|&id| {
                let task = registry.get(id);
                task.level == 0
                    && task.dependencies.iter().all(|dep| {
                        let parent_level = registry.get(dep.parent).level;
                        parent_level != 0 && parent_level < current_level
                    })
            })
            .collect();

        assert!(
            !ready.is_empty(),
            "dependency cycle detected during levelisation ({remaining} tasks unlevelled)"
        );

        for id in &ready {
            registry.get_mut(*id).level = current_level;
        }
        remaining -= ready.len();
        current_level += 1;
    }

    debug!(levels = current_level - 1, "levelisation complete");
}

/// The ordered task list: level ascending, then priority descending, then
/// id ascending, so ties break deterministically across runs.
pub fn ordered_task_list(registry: &TaskRegistry) -> Vec<TaskId> {
    let mut ids: Vec<TaskId> = registry.ids().collect();
    ids.sort_by(|&a, &b| {
        let (ta, tb) = (registry.get(a), registry.get(b));
        ta.level
            .cmp(&tb.level)
            .then(tb.priority.cmp(&ta.priority))
            .then(a.cmp(&b))
    });
    ids
}

/// One line per task: `level<TAB>kind<TAB>parent_name`, with kind one of
/// `disk`, `comm`, `func`.
pub fn format_task_list(registry: &TaskRegistry, ordered: &[TaskId]) -> String {
    let mut out = String::new();
    for &id in ordered {
        let task = registry.get(id);
        out.push_str(&format!(
            "{}\t{}\t{}\n",
            task.level,
            task.kind.diagnostic_tag(),
            task.label()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::task::{DepKind, Task, TaskKind};

    fn task(kind: TaskKind, name: &str) -> Task {
        Task::new(kind, "A", name)
    }

    #[test]
    fn chain_levels_are_consecutive() {
        let mut reg = TaskRegistry::new();
        let a = reg.register(task(TaskKind::AgentFunction, "a"));
        let b = reg.register(task(TaskKind::AgentFunction, "b"));
        let c = reg.register(task(TaskKind::IoPopWrite, "x"));
        reg.get_mut(b).add_dependency(DepKind::State, "s", a);
        reg.get_mut(c).add_dependency(DepKind::Data, "x", b);

        assign_levels(&mut reg);
        assert_eq!(reg.get(a).level, 1);
        assert_eq!(reg.get(b).level, 2);
        assert_eq!(reg.get(c).level, 3);
    }

    #[test]
    fn ordering_breaks_ties_by_priority_then_id() {
        let mut reg = TaskRegistry::new();
        // All independent, so everything lands on level 1.
        let disk = reg.register(task(TaskKind::IoPopWrite, "x"));
        let func = reg.register(task(TaskKind::AgentFunction, "f"));
        let start = reg.register(Task::new(TaskKind::SyncStart, "M", "sync_start"));
        assign_levels(&mut reg);

        let ordered = ordered_task_list(&reg);
        assert_eq!(ordered, vec![start, func, disk]);
    }

    #[test]
    #[should_panic(expected = "dependency cycle detected during levelisation")]
    fn cyclic_graph_panics() {
        let mut reg = TaskRegistry::new();
        let a = reg.register(task(TaskKind::AgentFunction, "a"));
        let b = reg.register(task(TaskKind::AgentFunction, "b"));
        reg.get_mut(a).add_dependency(DepKind::State, "s", b);
        reg.get_mut(b).add_dependency(DepKind::State, "t", a);
        assign_levels(&mut reg);
    }

    #[test]
    fn diagnostic_lines_use_short_tags() {
        let mut reg = TaskRegistry::new();
        let f = reg.register(task(TaskKind::AgentFunction, "f"));
        let d = reg.register(task(TaskKind::IoPopWrite, "x"));
        reg.get_mut(d).add_dependency(DepKind::Data, "x", f);
        assign_levels(&mut reg);
        let listing = format_task_list(&reg, &ordered_task_list(&reg));
        assert_eq!(listing, "1\tfunc\tA_f\n2\tdisk\tA_x\n");
    }
}
