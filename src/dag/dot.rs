// src/dag/dot.rs

//! Graphviz rendering of the dependency graph, for diagnostics.

use crate::dag::registry::TaskRegistry;

/// Render the graph as a `dot` digraph: bottom-to-top rank direction,
/// rectangular nodes labelled `parent\nname`, edges labelled by dependency
/// kind and the state/message/variable that caused them.
pub fn write_dot(registry: &TaskRegistry) -> String {
    let mut out = String::new();
    out.push_str("digraph dependency_graph {\n");
    out.push_str("\trankdir=BT;\n");
    out.push_str("\tsize=\"8,5;\"\n");
    out.push_str("\tnode [shape = rect];\n");
    out.push_str("\t\n\t/* Tasks */\n");

    for task in registry.iter() {
        out.push_str(&format!(
            "\t{}[label = \"{}\\n{}\"]\n",
            task.label(),
            task.parent_name,
            task.name
        ));
        for dep in &task.dependencies {
            let parent = registry.get(dep.parent);
            out.push_str(&format!(
                "\t{} -> {} [ label = \"<{}: {}>\" ];\n",
                task.label(),
                parent.label(),
                dep.kind.dot_prefix(),
                dep.label
            ));
        }
    }

    out.push('}');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::task::{DepKind, Task, TaskKind};

    #[test]
    fn dump_has_expected_shape() {
        let mut reg = TaskRegistry::new();
        let f = reg.register(Task::new(TaskKind::AgentFunction, "A", "f"));
        let d = reg.register(Task::new(TaskKind::IoPopWrite, "A", "x"));
        reg.get_mut(d).add_dependency(DepKind::Data, "x", f);

        let dot = write_dot(&reg);
        assert!(dot.starts_with("digraph dependency_graph {"));
        assert!(dot.contains("rankdir=BT;"));
        assert!(dot.contains("node [shape = rect];"));
        assert!(dot.contains("A_f[label = \"A\\nf\"]"));
        assert!(dot.contains("A_x -> A_f [ label = \"<Memory: x>\" ];"));
        assert!(dot.ends_with('}'));
    }
}
