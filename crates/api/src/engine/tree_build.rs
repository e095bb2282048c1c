//! Tree-build job driver.
//!
//! Advances on a fixed tick by a randomized increment. Non-terminal events
//! never report more than 99; the `tree_complete` event is the only one that
//! carries 100.

use std::time::Duration;

use pulse_core::commands::MerkleComputeStart;
use pulse_core::job::{JobKind, TreeBuildProgress, TreeTick, COMPLETE_PROGRESS};
use pulse_core::messages::{MerkleUpdate, MerkleUpdateKind, ServerEvent};
use pulse_core::pacing::PacingPolicy;
use pulse_core::types::JobId;

use super::runner::{JobDriver, Step};

pub struct TreeBuildDriver {
    job_id: JobId,
    tree: TreeBuildProgress,
}

impl TreeBuildDriver {
    /// Parameters must already be validated.
    pub fn new(job_id: JobId, params: &MerkleComputeStart) -> Self {
        Self {
            job_id,
            tree: TreeBuildProgress::new(params.item_count),
        }
    }

    fn update(&self, kind: MerkleUpdateKind, progress: f64) -> MerkleUpdate {
        MerkleUpdate {
            total_nodes: Some(self.tree.total_nodes()),
            ..MerkleUpdate::new(kind, Some(self.job_id.clone()), progress)
        }
    }
}

impl JobDriver for TreeBuildDriver {
    fn kind(&self) -> JobKind {
        JobKind::TreeBuild
    }

    fn start_event(&self) -> ServerEvent {
        let mut update = self.update(MerkleUpdateKind::TreeStart, 0.0);
        update.computed_nodes = Some(0);
        ServerEvent::merkle(update)
    }

    fn wait_before_step(&mut self, pacing: &dyn PacingPolicy) -> Option<Duration> {
        Some(pacing.tick_interval())
    }

    fn step(&mut self, pacing: &dyn PacingPolicy) -> Step {
        match self.tree.advance(pacing.next_increment()) {
            TreeTick::Progress {
                progress,
                computed_nodes,
            } => {
                let mut update = self.update(MerkleUpdateKind::Progress, progress);
                update.computed_nodes = Some(computed_nodes);
                update.current_node =
                    Some(computed_nodes.min(self.tree.total_nodes().saturating_sub(1)));
                Step::Progress(ServerEvent::merkle(update))
            }
            TreeTick::Complete => {
                let mut update = self.update(MerkleUpdateKind::TreeComplete, COMPLETE_PROGRESS);
                update.computed_nodes = Some(self.tree.total_nodes());
                Step::Complete(ServerEvent::merkle(update))
            }
        }
    }

    fn progress(&self) -> f64 {
        self.tree.reported_progress()
    }

    fn failure_event(&self, message: &str) -> ServerEvent {
        let mut update = MerkleUpdate::error(Some(self.job_id.clone()), self.progress(), message);
        update.total_nodes = Some(self.tree.total_nodes());
        ServerEvent::merkle(update)
    }
}
