// src/dag/build.rs

//! Graph construction from a validated model (C1).
//!
//! Four cataloguing phases populate the registry: agent-function tasks,
//! state edges, communication edges, and data edges. An explicit cycle
//! check runs last so that a cyclic state machine is reported with a
//! witness instead of hanging levelisation.

use std::collections::BTreeMap;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::errors::{SimError, SimResult};
use crate::model::Model;
use crate::{
    dag::registry::TaskRegistry,
    dag::task::{DepKind, Task, TaskId, TaskKind},
};

/// The constructed dependency graph: a registry with every task and edge in
/// place, levels still unassigned.
#[derive(Debug)]
pub struct TaskGraph {
    pub registry: TaskRegistry,
}

/// Build the task DAG for `model`.
///
/// # Errors
/// `DependencyCycle` when the state machines (or any combination of edges)
/// form a cycle; the error carries the ids of one offending cycle.
pub fn build_graph(model: &Model) -> SimResult<TaskGraph> {
    let mut builder = GraphBuilder::new(model);
    builder.catalog_agent_functions();
    builder.catalog_state_dependencies();
    builder.catalog_communication_dependencies();
    builder.catalog_data_dependencies();
    builder.check_cycles()?;
    debug!(tasks = builder.registry.len(), "dependency graph built");
    Ok(TaskGraph {
        registry: builder.registry,
    })
}

struct GraphBuilder<'m> {
    model: &'m Model,
    registry: TaskRegistry,
    /// (agent, function) -> task id.
    function_tasks: BTreeMap<(String, String), TaskId>,
    sync_start_tasks: BTreeMap<String, TaskId>,
    sync_finish_tasks: BTreeMap<String, TaskId>,
}

impl<'m> GraphBuilder<'m> {
    fn new(model: &'m Model) -> Self {
        Self {
            model,
            registry: TaskRegistry::new(),
            function_tasks: BTreeMap::new(),
            sync_start_tasks: BTreeMap::new(),
            sync_finish_tasks: BTreeMap::new(),
        }
    }

    /// Phase 1: one `AgentFunction` task per declared function, carrying the
    /// function's variable and message access sets.
    fn catalog_agent_functions(&mut self) {
        for agent in self.model.agents() {
            for func in &agent.functions {
                let mut task = Task::new(TaskKind::AgentFunction, &agent.name, &func.name);
                task.read_only_vars
                    .extend(func.read_only_vars.iter().cloned());
                task.write_vars.extend(func.read_write_vars.iter().cloned());
                task.read_vars.extend(func.read_only_vars.iter().cloned());
                task.read_vars.extend(func.read_write_vars.iter().cloned());
                task.reads_msgs.extend(func.reads.iter().cloned());
                task.posts_msgs.extend(func.posts.iter().cloned());
                let id = self.registry.register(task);
                self.function_tasks
                    .insert((agent.name.clone(), func.name.clone()), id);
            }
        }
    }

    /// Phase 2: within each agent, a function depends on every function
    /// whose `next_state` equals its `current_state`.
    fn catalog_state_dependencies(&mut self) {
        for agent in self.model.agents() {
            for func in &agent.functions {
                let child = self.function_task(&agent.name, &func.name);
                for other in &agent.functions {
                    if other.next_state == func.current_state {
                        let parent = self.function_task(&agent.name, &other.name);
                        self.registry.get_mut(child).add_dependency(
                            DepKind::State,
                            &func.current_state,
                            parent,
                        );
                    }
                }
            }
        }
    }

    /// Phase 3: one `SyncStart`/`SyncFinish` pair per message; every poster
    /// feeds the start, every reader waits on the finish.
    fn catalog_communication_dependencies(&mut self) {
        for message in self.model.messages() {
            let start = self.registry.register(Task::new(
                TaskKind::SyncStart,
                &message.name,
                "sync_start",
            ));
            let finish = self.registry.register(Task::new(
                TaskKind::SyncFinish,
                &message.name,
                "sync_finish",
            ));
            self.registry
                .get_mut(finish)
                .add_dependency(DepKind::Communication, &message.name, start);
            self.sync_start_tasks.insert(message.name.clone(), start);
            self.sync_finish_tasks.insert(message.name.clone(), finish);
        }

        for agent in self.model.agents() {
            for func in &agent.functions {
                let func_task = self.function_task(&agent.name, &func.name);
                for posted in &func.posts {
                    let start = self.sync_start_tasks[posted.as_str()];
                    self.registry.get_mut(start).add_dependency(
                        DepKind::Communication,
                        posted,
                        func_task,
                    );
                }
                for read in &func.reads {
                    let finish = self.sync_finish_tasks[read.as_str()];
                    self.registry.get_mut(func_task).add_dependency(
                        DepKind::Communication,
                        read,
                        finish,
                    );
                }
            }
        }
    }

    /// Phase 4: one `IoPopWrite` task per agent variable, depending on the
    /// last function (in declaration order) that writes the variable — or,
    /// when none writes it, on the last function declared, so that every
    /// variable is persisted exactly once per iteration.
    fn catalog_data_dependencies(&mut self) {
        for agent in self.model.agents() {
            for var in &agent.variables {
                let last_writer = agent
                    .functions
                    .iter()
                    .filter(|f| f.writes(&var.name))
                    .last()
                    .or_else(|| agent.functions.last())
                    .expect("validated agents have at least one function");
                let parent = self.function_task(&agent.name, &last_writer.name);
                let parent_level = self.registry.get(parent).level;

                let mut task = Task::new(TaskKind::IoPopWrite, &agent.name, &var.name);
                task.add_dependency(DepKind::Data, &var.name, parent);
                task.level = parent_level + 1;
                self.registry.register(task);
            }
        }
    }

    /// Depth-first cycle check over the whole graph; a strongly connected
    /// component with more than one task (or a self edge) is a cycle.
    fn check_cycles(&self) -> SimResult<()> {
        let mut graph: DiGraph<TaskId, ()> = DiGraph::with_capacity(self.registry.len(), 0);
        let nodes: Vec<NodeIndex> = self.registry.ids().map(|id| graph.add_node(id)).collect();
        for task in self.registry.iter() {
            for dep in &task.dependencies {
                graph.add_edge(nodes[task.id], nodes[dep.parent], ());
            }
        }

        for component in tarjan_scc(&graph) {
            let cyclic = component.len() > 1
                || graph.contains_edge(component[0], component[0]);
            if cyclic {
                let cycle: Vec<TaskId> = component.iter().map(|&n| graph[n]).collect();
                return Err(SimError::DependencyCycle { cycle });
            }
        }
        Ok(())
    }

    fn function_task(&self, agent: &str, function: &str) -> TaskId {
        self.function_tasks[&(agent.to_string(), function.to_string())]
    }
}
