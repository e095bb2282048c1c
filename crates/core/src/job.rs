//! Job lifecycle state machine and the pure progress models driven by the
//! job runners.
//!
//! Nothing here sleeps or emits: the runner in `pulse-api` owns the timers
//! and translates these values into outbound events.

use serde::Serialize;

use crate::error::CoreError;

/// Highest progress value a non-terminal event may report. 100 is reserved
/// for the completion event.
pub const NON_TERMINAL_PROGRESS_CEILING: f64 = 99.0;

/// Terminal progress value.
pub const COMPLETE_PROGRESS: f64 = 100.0;

// ---------------------------------------------------------------------------
// Kind and state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    TreeBuild,
    Benchmark,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::TreeBuild => "tree_build",
            JobKind::Benchmark => "benchmark",
        }
    }
}

/// `pending -> running -> {completed, failed}`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Running)
                | (JobState::Running, JobState::Completed)
                | (JobState::Running, JobState::Failed)
        )
    }

    /// Validate and perform a transition, returning the new state.
    pub fn transition(self, next: JobState) -> Result<JobState, CoreError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::Conflict(format!(
                "illegal job transition {self:?} -> {next:?}"
            )))
        }
    }
}

/// Observable status of a job: where it is in its lifecycle and how far along.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobStatus {
    pub state: JobState,
    /// In `0.0..=100.0`, non-decreasing.
    pub progress: f64,
}

impl Default for JobStatus {
    fn default() -> Self {
        Self {
            state: JobState::Pending,
            progress: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Tree build
// ---------------------------------------------------------------------------

/// Number of nodes in a binary hash tree over `item_count` leaves.
pub fn total_tree_nodes(item_count: u64) -> u64 {
    item_count.saturating_mul(2).saturating_sub(1)
}

/// Result of advancing a tree build by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TreeTick {
    /// Still running. `progress` is already clamped to the non-terminal ceiling.
    Progress { progress: f64, computed_nodes: u64 },
    /// Accumulated progress reached 100.
    Complete,
}

/// Accumulates randomized increments for a tree-build job.
#[derive(Debug, Clone)]
pub struct TreeBuildProgress {
    accumulated: f64,
    total_nodes: u64,
    complete: bool,
}

impl TreeBuildProgress {
    pub fn new(item_count: u64) -> Self {
        Self {
            accumulated: 0.0,
            total_nodes: total_tree_nodes(item_count),
            complete: false,
        }
    }

    pub fn total_nodes(&self) -> u64 {
        self.total_nodes
    }

    /// Progress as reported to clients: the accumulated value, capped at 99
    /// until completion.
    pub fn reported_progress(&self) -> f64 {
        if self.complete {
            COMPLETE_PROGRESS
        } else {
            self.accumulated.min(NON_TERMINAL_PROGRESS_CEILING)
        }
    }

    /// Apply one increment. Negative or non-finite increments count as zero.
    ///
    /// Once `Complete` has been returned every later call returns `Complete`
    /// again; the runner stops at the first one.
    pub fn advance(&mut self, increment: f64) -> TreeTick {
        if self.complete {
            return TreeTick::Complete;
        }
        let increment = if increment.is_finite() {
            increment.max(0.0)
        } else {
            0.0
        };
        let next = self.accumulated + increment;
        if next >= COMPLETE_PROGRESS {
            self.accumulated = COMPLETE_PROGRESS;
            self.complete = true;
            return TreeTick::Complete;
        }
        self.accumulated = next;
        let progress = self.reported_progress();
        TreeTick::Progress {
            progress,
            computed_nodes: self.nodes_at(progress),
        }
    }

    fn nodes_at(&self, progress: f64) -> u64 {
        ((progress / COMPLETE_PROGRESS) * self.total_nodes as f64).floor() as u64
    }
}

// ---------------------------------------------------------------------------
// Benchmark sweep
// ---------------------------------------------------------------------------

/// Row-major cursor over `sizes x iterations`: the outer loop walks sizes,
/// the inner loop walks iterations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkCursor {
    size_index: usize,
    iteration_index: u32,
    total_sizes: usize,
    total_iterations: u32,
}

impl BenchmarkCursor {
    pub fn new(total_sizes: usize, total_iterations: u32) -> Self {
        Self {
            size_index: 0,
            iteration_index: 0,
            total_sizes,
            total_iterations,
        }
    }

    /// `(size_index, iteration_index)` of the current unit, both 0-based, or
    /// `None` once every unit has been visited.
    pub fn current(&self) -> Option<(usize, u32)> {
        if self.is_exhausted() {
            None
        } else {
            Some((self.size_index, self.iteration_index))
        }
    }

    /// Move to the next unit in row-major order. No-op once exhausted.
    pub fn advance(&mut self) {
        if self.is_exhausted() {
            return;
        }
        self.iteration_index += 1;
        if self.iteration_index >= self.total_iterations {
            self.iteration_index = 0;
            self.size_index += 1;
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.total_iterations == 0 || self.size_index >= self.total_sizes
    }

    pub fn total_units(&self) -> u64 {
        self.total_sizes as u64 * u64::from(self.total_iterations)
    }

    /// Units visited so far.
    pub fn completed_units(&self) -> u64 {
        if self.is_exhausted() {
            return self.total_units();
        }
        self.size_index as u64 * u64::from(self.total_iterations)
            + u64::from(self.iteration_index)
    }

    /// Share of units visited, in `0.0..=100.0`.
    pub fn progress(&self) -> f64 {
        let total = self.total_units();
        if total == 0 {
            return COMPLETE_PROGRESS;
        }
        self.completed_units() as f64 / total as f64 * COMPLETE_PROGRESS
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn legal_transitions() {
        assert_eq!(JobState::Pending.transition(JobState::Running).unwrap(), JobState::Running);
        assert_eq!(
            JobState::Running.transition(JobState::Completed).unwrap(),
            JobState::Completed
        );
        assert_eq!(JobState::Running.transition(JobState::Failed).unwrap(), JobState::Failed);
    }

    #[test]
    fn terminal_states_are_final() {
        for terminal in [JobState::Completed, JobState::Failed] {
            assert!(terminal.is_terminal());
            for next in [
                JobState::Pending,
                JobState::Running,
                JobState::Completed,
                JobState::Failed,
            ] {
                assert_matches!(terminal.transition(next), Err(CoreError::Conflict(_)));
            }
        }
        assert_matches!(
            JobState::Pending.transition(JobState::Completed),
            Err(CoreError::Conflict(_))
        );
    }

    #[test]
    fn tree_node_count() {
        assert_eq!(total_tree_nodes(1), 1);
        assert_eq!(total_tree_nodes(8), 15);
        assert_eq!(total_tree_nodes(0), 0);
    }

    #[test]
    fn tree_progress_caps_at_99_until_complete() {
        let mut tree = TreeBuildProgress::new(8);

        assert_eq!(
            tree.advance(60.0),
            TreeTick::Progress {
                progress: 60.0,
                computed_nodes: 9
            }
        );
        assert_matches!(tree.advance(39.5), TreeTick::Progress { progress, .. } => {
            assert_eq!(progress, 99.0);
        });
        assert_eq!(tree.advance(0.5), TreeTick::Complete);
        assert_eq!(tree.reported_progress(), 100.0);
        assert_eq!(tree.advance(5.0), TreeTick::Complete);
    }

    #[test]
    fn tree_progress_ignores_negative_and_nan_increments() {
        let mut tree = TreeBuildProgress::new(4);
        tree.advance(10.0);

        assert_matches!(tree.advance(-5.0), TreeTick::Progress { progress, .. } => {
            assert_eq!(progress, 10.0);
        });
        assert_matches!(tree.advance(f64::NAN), TreeTick::Progress { progress, .. } => {
            assert_eq!(progress, 10.0);
        });
    }

    #[test]
    fn benchmark_cursor_walks_row_major() {
        let mut cursor = BenchmarkCursor::new(2, 3);
        let mut seen = Vec::new();
        while let Some(unit) = cursor.current() {
            seen.push(unit);
            cursor.advance();
        }

        assert_eq!(seen, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);
        assert!(cursor.is_exhausted());
        assert_eq!(cursor.completed_units(), 6);
        assert_eq!(cursor.progress(), 100.0);
    }

    #[test]
    fn benchmark_cursor_progress_is_proportional() {
        let mut cursor = BenchmarkCursor::new(2, 2);
        assert_eq!(cursor.progress(), 0.0);
        cursor.advance();
        assert_eq!(cursor.progress(), 25.0);
        cursor.advance();
        cursor.advance();
        assert_eq!(cursor.progress(), 75.0);
    }

    #[test]
    fn empty_cursor_is_exhausted() {
        assert!(BenchmarkCursor::new(0, 3).is_exhausted());
        assert!(BenchmarkCursor::new(3, 0).is_exhausted());
        assert_eq!(BenchmarkCursor::new(3, 0).current(), None);
    }
}
