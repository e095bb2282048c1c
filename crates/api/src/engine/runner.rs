//! Shared job runner for tree builds and benchmark sweeps.
//!
//! A [`JobDriver`] knows how one kind of job starts, paces and ends; the
//! runner owns the lifecycle (`pending -> running -> {completed, failed}`),
//! the timers and the cancellation point between steps.

use std::sync::Arc;
use std::time::Duration;

use pulse_core::job::{JobKind, JobState, JobStatus, COMPLETE_PROGRESS};
use pulse_core::messages::ServerEvent;
use pulse_core::pacing::PacingPolicy;
use pulse_core::types::JobId;
use pulse_events::EventSender;
use tokio::sync::watch;

use super::producer::{ProducerHandle, ProducerSink};

/// Outcome of one driver step.
#[derive(Debug)]
pub enum Step {
    /// Non-terminal progress event.
    Progress(ServerEvent),
    /// Terminal success event.
    Complete(ServerEvent),
    /// Terminal failure with a human-readable message.
    Failed(String),
}

pub trait JobDriver: Send + 'static {
    fn kind(&self) -> JobKind;

    /// Event announcing the job and its total expected units.
    fn start_event(&self) -> ServerEvent;

    /// How long to wait before the next step, or `None` to step immediately.
    fn wait_before_step(&mut self, pacing: &dyn PacingPolicy) -> Option<Duration>;

    fn step(&mut self, pacing: &dyn PacingPolicy) -> Step;

    /// Current progress in `0.0..=100.0`.
    fn progress(&self) -> f64;

    /// Terminal event reporting a failure.
    fn failure_event(&self, message: &str) -> ServerEvent;
}

/// A running (or finished) job owned by a session.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    kind: JobKind,
    status: watch::Receiver<JobStatus>,
    producer: ProducerHandle,
}

impl JobHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn status(&self) -> JobStatus {
        *self.status.borrow()
    }

    /// Stop the job silently. Idempotent.
    pub fn cancel(&self) {
        self.producer.cancel();
        tracing::debug!(job_id = %self.id, kind = self.kind.as_str(), "Job cancelled");
    }

    pub fn is_cancelled(&self) -> bool {
        self.producer.is_cancelled()
    }

    /// Whether the job task has exited.
    pub fn is_finished(&self) -> bool {
        self.producer.is_finished()
    }

    /// Wait for a terminal state. Returns `None` if the job was cancelled
    /// before reaching one.
    pub async fn finished(&self) -> Option<JobStatus> {
        let mut status = self.status.clone();
        let result = status.wait_for(|s| s.state.is_terminal()).await;
        result.ok().map(|s| *s)
    }
}

/// Start a job: enter `running`, emit its start event and spawn the step
/// loop. The start event is enqueued before this returns.
pub fn spawn_job<D: JobDriver>(
    job_id: JobId,
    driver: D,
    pacing: Arc<dyn PacingPolicy>,
    sender: EventSender,
) -> JobHandle {
    let kind = driver.kind();
    let (status_tx, status_rx) = watch::channel(JobStatus::default());
    let mut lifecycle = Lifecycle {
        job_id: job_id.clone(),
        kind,
        state: JobState::Pending,
        status: status_tx,
    };

    let producer = ProducerHandle::spawn(sender, move |sink| {
        if lifecycle.transition(JobState::Running, 0.0) {
            sink.emit(driver.start_event());
            tracing::info!(job_id = %lifecycle.job_id, kind = kind.as_str(), "Job started");
        }
        run_steps(driver, lifecycle, pacing, sink)
    });

    JobHandle {
        id: job_id,
        kind,
        status: status_rx,
        producer,
    }
}

async fn run_steps<D: JobDriver>(
    mut driver: D,
    mut lifecycle: Lifecycle,
    pacing: Arc<dyn PacingPolicy>,
    sink: ProducerSink,
) {
    if lifecycle.state != JobState::Running {
        return;
    }

    loop {
        if let Some(wait) = driver.wait_before_step(pacing.as_ref()) {
            if !sink.sleep(wait).await {
                return;
            }
        }
        if sink.is_cancelled() {
            return;
        }

        match driver.step(pacing.as_ref()) {
            Step::Progress(event) => {
                if !sink.emit(event) {
                    return;
                }
                lifecycle.report_progress(driver.progress());
            }
            Step::Complete(event) => {
                if sink.emit(event) {
                    lifecycle.transition(JobState::Completed, COMPLETE_PROGRESS);
                    tracing::info!(
                        job_id = %lifecycle.job_id,
                        kind = lifecycle.kind.as_str(),
                        "Job completed",
                    );
                }
                return;
            }
            Step::Failed(message) => {
                if sink.emit(driver.failure_event(&message)) {
                    lifecycle.transition(JobState::Failed, driver.progress());
                    tracing::warn!(
                        job_id = %lifecycle.job_id,
                        kind = lifecycle.kind.as_str(),
                        error = %message,
                        "Job failed",
                    );
                }
                return;
            }
        }
    }
}

/// Authoritative job state plus its published status.
struct Lifecycle {
    job_id: JobId,
    kind: JobKind,
    state: JobState,
    status: watch::Sender<JobStatus>,
}

impl Lifecycle {
    fn transition(&mut self, next: JobState, progress: f64) -> bool {
        match self.state.transition(next) {
            Ok(state) => {
                self.state = state;
                self.status.send_modify(|s| {
                    s.state = state;
                    s.progress = s.progress.max(progress);
                });
                true
            }
            Err(e) => {
                tracing::error!(job_id = %self.job_id, error = %e, "Rejected job transition");
                false
            }
        }
    }

    fn report_progress(&self, progress: f64) {
        self.status.send_if_modified(|s| {
            if progress > s.progress {
                s.progress = progress;
                true
            } else {
                false
            }
        });
    }
}
