// src/engine/queue.rs

//! The splitting FIFO task queue and its worker pool (C5 + C6).
//!
//! One mutex guards the FIFO, the split map and every splitter counter;
//! `enqueue`, `get_next` and `task_done` each hold it for their full
//! duration, which makes the three operations linearisable. Workers are
//! created with the queue and joined by its destructor after one `TERM`
//! sentinel has been enqueued per worker.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace, warn};

use crate::dag::registry::TaskRegistry;
use crate::dag::task::{TaskId, TaskKind, TERM_TASK_ID};
use crate::engine::backend::{ExecutionBackend, RowRange};
use crate::engine::splitter::TaskSplitter;
use crate::engine::ExecOptions;
use crate::errors::SimError;

/// Invoked once per original task id when the task (including every
/// sub-task) has completed, with the first failure observed, if any.
pub type CompletionCallback = Box<dyn Fn(TaskId, Option<SimError>) + Send + Sync>;

/// What a worker receives from the queue: the original task id plus the
/// row range to cover when the task was split.
#[derive(Debug, Clone, Copy)]
struct Assignment {
    task_id: TaskId,
    rows: Option<RowRange>,
}

struct SplitEntry {
    splitter: TaskSplitter,
    failure: Option<SimError>,
}

struct QueueState {
    fifo: VecDeque<TaskId>,
    split_map: BTreeMap<TaskId, SplitEntry>,
}

struct Shared {
    state: Mutex<QueueState>,
    ready: Condvar,
    registry: Arc<TaskRegistry>,
    backend: Arc<dyn ExecutionBackend>,
    on_complete: CompletionCallback,
    max_splits: usize,
    min_vector_size: usize,
    splittable: BTreeSet<TaskKind>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().expect("task queue mutex poisoned")
    }

    fn enqueue(&self, task_id: TaskId) {
        let mut state = self.lock();
        state.fifo.push_back(task_id);

        if task_id != TERM_TASK_ID {
            let task = self.registry.get(task_id);
            if self.splittable.contains(&task.kind) {
                let rows = self.backend.task_rows(task);
                if let Some(splitter) =
                    TaskSplitter::split(task_id, rows, self.max_splits, self.min_vector_size)
                {
                    if state.split_map.contains_key(&task_id) {
                        panic!("{}", SimError::TaskIdConflict { task_id });
                    }
                    trace!(
                        task_id,
                        subtasks = splitter.subtask_count(),
                        "task split on enqueue"
                    );
                    state.split_map.insert(
                        task_id,
                        SplitEntry {
                            splitter,
                            failure: None,
                        },
                    );
                    drop(state);
                    // Several sub-tasks became available at once.
                    self.ready.notify_all();
                    return;
                }
            }
        }

        drop(state);
        self.ready.notify_one();
    }

    /// Blocks until work is available.
    fn get_next(&self) -> Assignment {
        let mut state = self.lock();
        loop {
            if let Some(assignment) = Self::pop_next(&mut state) {
                return assignment;
            }
            state = self
                .ready
                .wait(state)
                .expect("task queue condvar poisoned");
        }
    }

    fn pop_next(state: &mut QueueState) -> Option<Assignment> {
        let &task_id = state.fifo.front()?;
        if let Some(entry) = state.split_map.get_mut(&task_id) {
            let (range, none_pending) = entry.splitter.next_subtask();
            if none_pending {
                state.fifo.pop_front();
            }
            Some(Assignment {
                task_id,
                rows: Some(range),
            })
        } else {
            state.fifo.pop_front();
            Some(Assignment {
                task_id,
                rows: None,
            })
        }
    }

    fn task_done(&self, task_id: TaskId, failure: Option<SimError>) {
        let mut state = self.lock();
        let completion = match state.split_map.get_mut(&task_id) {
            Some(entry) => {
                if let Some(f) = failure {
                    entry.failure.get_or_insert(f);
                }
                if entry.splitter.one_done() {
                    let entry = state
                        .split_map
                        .remove(&task_id)
                        .expect("split entry vanished");
                    Some((task_id, entry.failure))
                } else {
                    None
                }
            }
            None => Some((task_id, failure)),
        };
        drop(state);

        if let Some((task_id, failure)) = completion {
            (self.on_complete)(task_id, failure);
        }
    }

    fn is_empty(&self) -> bool {
        let state = self.lock();
        state.fifo.is_empty() && state.split_map.is_empty()
    }
}

/// Bounded-concurrency producer/consumer queue owning a fixed worker pool.
pub struct SplittingFifoQueue {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    slots: usize,
}

impl SplittingFifoQueue {
    pub fn new(
        options: &ExecOptions,
        registry: Arc<TaskRegistry>,
        backend: Arc<dyn ExecutionBackend>,
        on_complete: CompletionCallback,
    ) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                fifo: VecDeque::new(),
                split_map: BTreeMap::new(),
            }),
            ready: Condvar::new(),
            registry,
            backend,
            on_complete,
            max_splits: options.max_splits,
            min_vector_size: options.min_vector_size,
            splittable: options.splittable.clone(),
        });

        let workers = (0..options.slots)
            .map(|index| {
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("simdag-worker-{index}"))
                    .spawn(move || worker_loop(shared, index))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        debug!(slots = options.slots, "worker pool started");
        Self {
            shared,
            workers,
            slots: options.slots,
        }
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Submit a task for execution. Splittable tasks whose row count allows
    /// it are split here; the duplicate-id guard panics, since a second
    /// active splitter for the same id means the scheduler is broken.
    pub fn enqueue(&self, task_id: TaskId) {
        self.shared.enqueue(task_id);
    }

    /// True when neither queued ids nor active splitters remain.
    pub fn is_empty(&self) -> bool {
        self.shared.is_empty()
    }
}

impl Drop for SplittingFifoQueue {
    fn drop(&mut self) {
        for _ in 0..self.slots {
            self.shared.enqueue(TERM_TASK_ID);
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread panicked before shutdown");
            }
        }
        debug!("worker pool joined");
    }
}

fn worker_loop(shared: Arc<Shared>, index: usize) {
    trace!(worker = index, "worker started");
    loop {
        let assignment = shared.get_next();
        if assignment.task_id == TERM_TASK_ID {
            debug!(worker = index, "worker received shutdown sentinel");
            return;
        }

        let task = shared.registry.get(assignment.task_id);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            shared.backend.execute(task, assignment.rows)
        }));
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(SimError::TaskExecutionFailed {
                task_id: assignment.task_id,
                message: format!("{err:#}"),
            }),
            Err(payload) => Some(SimError::TaskExecutionFailed {
                task_id: assignment.task_id,
                message: panic_message(payload.as_ref()),
            }),
        };
        shared.task_done(assignment.task_id, failure);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("task body panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("task body panicked: {s}")
    } else {
        "task body panicked".to_string()
    }
}
