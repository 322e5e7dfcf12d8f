// src/engine/splitter.rs

//! Partitioning of a data-parallel task into sub-tasks (C4).
//!
//! A splitter is not thread-safe on its own; the queue holds its mutex
//! while calling into it.

use crate::dag::task::TaskId;
use crate::engine::backend::RowRange;

/// Tracks the sub-tasks of one split task: which are still pending, which
/// are running, and which range the next worker receives.
#[derive(Debug)]
pub struct TaskSplitter {
    task_id: TaskId,
    pending: usize,
    running: usize,
    next: usize,
    subtasks: Vec<RowRange>,
}

impl TaskSplitter {
    /// Partition `[0, rows)` into at most `max_splits` contiguous chunks of
    /// at least `min_vector_size` rows each, sizes differing by at most one.
    ///
    /// Returns `None` when the range is too small to yield more than one
    /// chunk; such tasks run whole.
    pub fn split(
        task_id: TaskId,
        rows: usize,
        max_splits: usize,
        min_vector_size: usize,
    ) -> Option<Self> {
        if rows < min_vector_size {
            return None;
        }
        let chunks = max_splits.min(rows / min_vector_size);
        if chunks < 2 {
            return None;
        }

        let base = rows / chunks;
        let extra = rows % chunks;
        let mut subtasks = Vec::with_capacity(chunks);
        let mut start = 0;
        for i in 0..chunks {
            let len = base + usize::from(i < extra);
            subtasks.push(RowRange::new(start, start + len));
            start += len;
        }

        Some(Self {
            task_id,
            pending: chunks,
            running: 0,
            next: 0,
            subtasks,
        })
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn subtask_count(&self) -> usize {
        self.subtasks.len()
    }

    /// Hand out the next sub-task. The second element is true when no
    /// sub-tasks remain pending, i.e. the parent may leave the queue head.
    pub fn next_subtask(&mut self) -> (RowRange, bool) {
        let range = self.subtasks[self.next];
        self.next += 1;
        self.pending -= 1;
        self.running += 1;
        (range, self.pending == 0)
    }

    /// Record one finished sub-task; true once every sub-task has been both
    /// assigned and completed.
    pub fn one_done(&mut self) -> bool {
        self.running -= 1;
        self.pending == 0 && self.running == 0
    }

    pub fn none_pending(&self) -> bool {
        self.pending == 0
    }

    pub fn is_complete(&self) -> bool {
        self.pending == 0 && self.running == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn even_split() {
        let s = TaskSplitter::split(0, 1000, 4, 100).unwrap();
        let sizes: Vec<usize> = s.subtasks.iter().map(|r| r.len()).collect();
        assert_eq!(sizes, vec![250, 250, 250, 250]);
    }

    #[test]
    fn remainder_spreads_over_leading_chunks() {
        let s = TaskSplitter::split(0, 350, 4, 100).unwrap();
        let sizes: Vec<usize> = s.subtasks.iter().map(|r| r.len()).collect();
        assert_eq!(sizes, vec![117, 117, 116]);
    }

    #[test]
    fn small_ranges_do_not_split() {
        assert!(TaskSplitter::split(0, 50, 4, 100).is_none());
        // Big enough for one chunk only: still runs whole.
        assert!(TaskSplitter::split(0, 150, 4, 100).is_none());
        assert!(TaskSplitter::split(0, 1000, 1, 100).is_none());
    }

    #[test]
    fn assignment_and_completion_counters() {
        let mut s = TaskSplitter::split(7, 400, 2, 100).unwrap();
        assert_eq!(s.task_id(), 7);
        assert_eq!(s.subtask_count(), 2);

        let (first, none_pending) = s.next_subtask();
        assert_eq!((first.start, first.end), (0, 200));
        assert!(!none_pending);

        let (second, none_pending) = s.next_subtask();
        assert_eq!((second.start, second.end), (200, 400));
        assert!(none_pending);
        assert!(s.none_pending());

        assert!(!s.one_done());
        assert!(s.one_done());
        assert!(s.is_complete());
    }

    proptest! {
        #[test]
        fn chunks_tile_the_range(
            rows in 1usize..20_000,
            max_splits in 1usize..32,
            min_vector_size in 1usize..512,
        ) {
            if let Some(s) = TaskSplitter::split(0, rows, max_splits, min_vector_size) {
                prop_assert!(s.subtasks.len() >= 2);
                prop_assert!(s.subtasks.len() <= max_splits);

                let mut expected_start = 0;
                let mut min_len = usize::MAX;
                let mut max_len = 0;
                for range in &s.subtasks {
                    prop_assert_eq!(range.start, expected_start);
                    prop_assert!(range.len() >= min_vector_size);
                    min_len = min_len.min(range.len());
                    max_len = max_len.max(range.len());
                    expected_start = range.end;
                }
                prop_assert_eq!(expected_start, rows);
                prop_assert!(max_len - min_len <= 1);
            }
        }
    }
}
