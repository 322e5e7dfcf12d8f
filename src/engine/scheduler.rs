// src/engine/scheduler.rs

//! The iteration driver (C7): submits the ordered task list one level at a
//! time and waits for the queue to report every completion before the next
//! level may start.

use std::sync::{Arc, Condvar, Mutex};

use tracing::{debug, trace, warn};

use crate::dag::level::ordered_task_list;
use crate::dag::registry::TaskRegistry;
use crate::dag::task::TaskId;
use crate::engine::queue::{CompletionCallback, SplittingFifoQueue};
use crate::errors::{SimError, SimResult};

#[derive(Default)]
struct BarrierState {
    expected: usize,
    completed: usize,
    failures: Vec<SimError>,
}

/// Counts queue completion callbacks for the level in flight. Failures are
/// buffered here and drained when the scheduler passes the barrier, so
/// `TaskDone` bookkeeping always finishes even when a task failed.
#[derive(Default)]
pub struct CompletionBarrier {
    state: Mutex<BarrierState>,
    done: Condvar,
}

impl CompletionBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// The queue-facing completion callback bound to this barrier.
    pub fn callback(self: &Arc<Self>) -> CompletionCallback {
        let barrier = Arc::clone(self);
        Box::new(move |task_id, failure| barrier.task_completed(task_id, failure))
    }

    fn begin_level(&self, expected: usize) {
        let mut state = self.state.lock().expect("barrier mutex poisoned");
        state.expected = expected;
        state.completed = 0;
        state.failures.clear();
    }

    fn task_completed(&self, task_id: TaskId, failure: Option<SimError>) {
        let mut state = self.state.lock().expect("barrier mutex poisoned");
        state.completed += 1;
        if let Some(failure) = failure {
            warn!(task_id, error = %failure, "task failed");
            state.failures.push(failure);
        }
        if state.completed >= state.expected {
            self.done.notify_all();
        }
    }

    fn wait_level(&self) -> Vec<SimError> {
        let mut state = self.state.lock().expect("barrier mutex poisoned");
        while state.completed < state.expected {
            state = self.done.wait(state).expect("barrier condvar poisoned");
        }
        std::mem::take(&mut state.failures)
    }
}

/// Drives complete iterations over a levelled task list.
pub struct Scheduler {
    registry: Arc<TaskRegistry>,
    ordered: Vec<TaskId>,
}

impl Scheduler {
    /// Build the scheduler from a registry whose levels are assigned.
    pub fn new(registry: Arc<TaskRegistry>) -> Self {
        let ordered = ordered_task_list(&registry);
        Self { registry, ordered }
    }

    /// The level-sorted task list this scheduler submits.
    pub fn ordered(&self) -> &[TaskId] {
        &self.ordered
    }

    /// Execute one iteration: submit every level in order, wait for its
    /// completions, abort on the first recorded failure.
    pub fn run_iteration(
        &self,
        queue: &SplittingFifoQueue,
        barrier: &CompletionBarrier,
    ) -> SimResult<()> {
        let mut start = 0;
        while start < self.ordered.len() {
            let level = self.registry.get(self.ordered[start]).level;
            let mut end = start;
            while end < self.ordered.len() && self.registry.get(self.ordered[end]).level == level {
                end += 1;
            }

            let submitted = end - start;
            trace!(level, tasks = submitted, "submitting level");
            barrier.begin_level(submitted);
            for &task_id in &self.ordered[start..end] {
                queue.enqueue(task_id);
            }

            let mut failures = barrier.wait_level();
            if !failures.is_empty() {
                let first = failures.remove(0);
                warn!(level, error = %first, "aborting iteration at level barrier");
                return Err(first);
            }

            start = end;
        }
        debug!("iteration complete");
        Ok(())
    }
}
