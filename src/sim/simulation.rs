// src/sim/simulation.rs

//! The simulation facade: the embedding API, the per-kind task bodies, and
//! the iteration loop.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info, trace};

use crate::dag::{assign_levels, build_graph, Task, TaskKind};
use crate::engine::backend::{ExecutionBackend, RowRange, RowVerdict};
use crate::engine::scheduler::{CompletionBarrier, Scheduler};
use crate::engine::{ExecOptions, SplittingFifoQueue};
use crate::errors::{SimError, SimResult};
use crate::io::xml_pop;
use crate::model::{Model, Value};
use crate::sim::board::{MessageBoard, MessageRow};
use crate::sim::store::{AgentStore, MemoryView, ViewVar};

/// A user-supplied agent function: runs once per live row with a memory
/// view limited to the declared variables and board access limited to the
/// declared message reads/posts.
pub type AgentFn = Arc<
    dyn Fn(&mut MemoryView, &mut BoardAccess<'_>) -> anyhow::Result<RowVerdict> + Send + Sync,
>;

/// Message-board window handed to an agent function, restricted to its
/// declared reads and posts.
pub struct BoardAccess<'a> {
    boards: &'a BTreeMap<String, MessageBoard>,
    reads: &'a BTreeSet<String>,
    posts: &'a BTreeSet<String>,
}

impl BoardAccess<'_> {
    pub fn post(&mut self, message: &str, row: MessageRow) -> SimResult<()> {
        if !self.posts.contains(message) {
            return Err(SimError::InvalidArgument(format!(
                "function does not declare posts to message '{message}'"
            )));
        }
        self.boards
            .get(message)
            .expect("validated message has a board")
            .post(row)
    }

    pub fn read(&self, message: &str) -> SimResult<MessageReader> {
        if !self.reads.contains(message) {
            return Err(SimError::InvalidArgument(format!(
                "function does not declare reads from message '{message}'"
            )));
        }
        let rows = self
            .boards
            .get(message)
            .expect("validated message has a board")
            .read();
        Ok(MessageReader { rows })
    }
}

/// Iterates the frozen messages of a board.
pub struct MessageReader {
    rows: Arc<Vec<MessageRow>>,
}

impl MessageReader {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MessageRow> {
        self.rows.iter()
    }
}

/// Shared state the worker pool executes against.
struct SimCore {
    model: Model,
    stores: BTreeMap<String, AgentStore>,
    boards: BTreeMap<String, MessageBoard>,
    functions: RwLock<BTreeMap<String, AgentFn>>,
    /// Columns captured by `IoPopWrite` tasks during the iteration, drained
    /// into the population document at iteration end.
    persisted: Mutex<BTreeMap<(String, String), Vec<Value>>>,
}

impl SimCore {
    fn store(&self, agent: &str) -> &AgentStore {
        self.stores
            .get(agent)
            .expect("task references a validated agent")
    }

    fn board(&self, message: &str) -> &MessageBoard {
        self.boards
            .get(message)
            .expect("task references a validated message")
    }

    fn run_agent_function(&self, task: &Task, rows: Option<RowRange>) -> anyhow::Result<()> {
        let store = self.store(&task.parent_name);
        let range = rows.unwrap_or_else(|| RowRange::whole(store.rows()));
        if range.is_empty() {
            return Ok(());
        }

        let func = self
            .functions
            .read()
            .expect("function registry poisoned")
            .get(&task.name)
            .cloned();
        let Some(func) = func else {
            trace!(
                agent = %task.parent_name,
                function = %task.name,
                "no callback registered; identity transition"
            );
            return Ok(());
        };

        let agent = self
            .model
            .agent(&task.parent_name)
            .expect("task references a validated agent");
        let vars: Arc<Vec<ViewVar>> = Arc::new(
            agent
                .variables
                .iter()
                .filter(|v| task.read_vars.contains(&v.name))
                .map(|v| ViewVar {
                    name: v.name.clone(),
                    ty: v.ty,
                    writable: task.write_vars.contains(&v.name),
                })
                .collect(),
        );

        let staged = store.read_rows(range, &vars);
        let mut results = Vec::with_capacity(staged.len());
        for values in staged {
            let mut view = MemoryView::new(Arc::clone(&vars), values);
            let mut boards = BoardAccess {
                boards: &self.boards,
                reads: &task.reads_msgs,
                posts: &task.posts_msgs,
            };
            let verdict = func(&mut view, &mut boards)?;
            results.push((view.into_values(), verdict));
        }
        store.write_rows(range, &vars, results);
        Ok(())
    }

    fn persist_variable(&self, agent: &str, var: &str) -> anyhow::Result<()> {
        let column = self
            .store(agent)
            .column(var)
            .expect("task references a validated variable");
        self.persisted
            .lock()
            .expect("persist sink poisoned")
            .insert((agent.to_string(), var.to_string()), column);
        Ok(())
    }

    fn take_persisted(&self) -> BTreeMap<(String, String), Vec<Value>> {
        std::mem::take(&mut self.persisted.lock().expect("persist sink poisoned"))
    }

    fn compact_all(&self) {
        for store in self.stores.values() {
            store.compact();
        }
    }
}

impl ExecutionBackend for SimCore {
    fn task_rows(&self, task: &Task) -> usize {
        match task.kind {
            TaskKind::AgentFunction => self.store(&task.parent_name).rows(),
            _ => 0,
        }
    }

    fn execute(&self, task: &Task, rows: Option<RowRange>) -> anyhow::Result<()> {
        match task.kind {
            TaskKind::AgentFunction => self.run_agent_function(task, rows),
            TaskKind::SyncStart => {
                self.board(&task.parent_name).sync_start();
                Ok(())
            }
            TaskKind::SyncFinish => {
                self.board(&task.parent_name).sync_finish();
                Ok(())
            }
            TaskKind::IoPopWrite => self.persist_variable(&task.parent_name, &task.name),
            _ => Ok(()),
        }
    }
}

/// Owns a model and everything needed to run it.
pub struct Simulation {
    core: Arc<SimCore>,
    output_prefix: Option<PathBuf>,
    next_itno: usize,
}

impl Simulation {
    pub fn new(model: Model) -> Self {
        let stores = model
            .agents()
            .iter()
            .map(|a| (a.name.clone(), AgentStore::new(a)))
            .collect();
        let boards = model
            .messages()
            .iter()
            .map(|m| (m.name.clone(), MessageBoard::new(m)))
            .collect();
        Self {
            core: Arc::new(SimCore {
                model,
                stores,
                boards,
                functions: RwLock::new(BTreeMap::new()),
                persisted: Mutex::new(BTreeMap::new()),
            }),
            output_prefix: None,
            next_itno: 1,
        }
    }

    pub fn model(&self) -> &Model {
        &self.core.model
    }

    /// Bind a user callback to the agent-function name used in the model.
    pub fn register_agent_function<F>(&mut self, name: &str, func: F) -> SimResult<()>
    where
        F: Fn(&mut MemoryView, &mut BoardAccess<'_>) -> anyhow::Result<RowVerdict>
            + Send
            + Sync
            + 'static,
    {
        let known = self
            .core
            .model
            .agents()
            .iter()
            .flat_map(|a| &a.functions)
            .any(|f| f.name == name);
        if !known {
            return Err(SimError::ModelValidation(format!(
                "no agent declares a function named '{name}'"
            )));
        }
        self.core
            .functions
            .write()
            .expect("function registry poisoned")
            .insert(name.to_string(), Arc::new(func));
        Ok(())
    }

    /// Where population documents go: one `<prefix><iteration>.xml` per
    /// iteration. Unset means population output is skipped.
    pub fn set_output_prefix(&mut self, prefix: impl Into<PathBuf>) {
        self.output_prefix = Some(prefix.into());
    }

    /// Replace the current population with the contents of an XML document.
    pub fn load_population(&mut self, path: &Path) -> SimResult<()> {
        let population = xml_pop::read_population(path, &self.core.model)?;
        for store in self.core.stores.values() {
            store.clear();
        }
        for row in &population.rows {
            self.core.store(&row.agent).push_row(&row.values)?;
        }
        self.next_itno = population.itno + 1;
        info!(
            path = %path.display(),
            itno = population.itno,
            rows = population.rows.len(),
            "population loaded"
        );
        Ok(())
    }

    /// Direct access to one agent's memory, mainly for embedders and tests.
    pub fn store(&self, agent: &str) -> Option<&AgentStore> {
        self.core.stores.get(agent)
    }

    /// Run `iterations` complete iterations on a pool of `slots` workers.
    pub fn run(&mut self, iterations: usize, slots: usize) -> SimResult<()> {
        let options = ExecOptions::new(slots)?;
        self.run_with_options(iterations, &options)
    }

    pub fn run_with_options(&mut self, iterations: usize, options: &ExecOptions) -> SimResult<()> {
        let graph = build_graph(&self.core.model)?;
        let mut registry = graph.registry;
        assign_levels(&mut registry);
        let registry = Arc::new(registry);

        let barrier = Arc::new(CompletionBarrier::new());
        let scheduler = Scheduler::new(Arc::clone(&registry));
        let backend: Arc<dyn ExecutionBackend> = self.core.clone() as Arc<dyn ExecutionBackend>;
        let queue = SplittingFifoQueue::new(options, registry, backend, barrier.callback());

        info!(
            iterations,
            slots = options.slots,
            tasks = scheduler.ordered().len(),
            "starting run"
        );
        for _ in 0..iterations {
            scheduler.run_iteration(&queue, &barrier)?;
            self.finish_iteration()?;
        }
        Ok(())
    }

    /// End-of-iteration work: flush the persisted columns to the population
    /// sink, then apply deaths.
    fn finish_iteration(&mut self) -> SimResult<()> {
        let itno = self.next_itno;
        self.next_itno += 1;

        let snapshots = self.core.take_persisted();
        if let Some(prefix) = &self.output_prefix {
            let path = xml_pop::write_population(prefix, itno, &self.core.model, &snapshots)?;
            debug!(path = %path.display(), itno, "population written");
        }

        self.core.compact_all();
        Ok(())
    }
}
