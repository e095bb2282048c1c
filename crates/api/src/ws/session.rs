//! Per-connection session: command dispatch and ownership of the
//! session's producers.

use std::collections::HashMap;
use std::sync::Arc;

use pulse_core::commands::{BenchmarkStart, ClientCommand, IncomingMessage, MerkleComputeStart};
use pulse_core::error::CoreError;
use pulse_core::messages::{BenchmarkUpdate, MerkleUpdate, ServerEvent};
use pulse_core::pacing::PacingPolicy;
use pulse_core::types::{new_id, JobId, SessionId};
use pulse_events::{BroadcastHub, ConfigState, EventSender};
use serde_json::{Map, Value};

use crate::engine::benchmark::BenchmarkDriver;
use crate::engine::tree_build::TreeBuildDriver;
use crate::engine::{spawn_job, JobHandle, TelemetryHandle, TelemetryPublisher};

/// Process-wide services every session uses.
#[derive(Clone)]
pub struct SessionContext {
    pub hub: Arc<BroadcastHub>,
    pub config_state: Arc<ConfigState>,
    pub pacing: Arc<dyn PacingPolicy>,
    pub telemetry: TelemetryPublisher,
}

/// One client's connection state.
///
/// Created by [`ConnectionGateway::connect`](super::gateway::ConnectionGateway::connect)
/// and closed by `disconnect`; after closing, the session holds no channel
/// sender and every producer it started has been cancelled.
pub struct Session {
    id: SessionId,
    sender: Option<EventSender>,
    jobs: HashMap<JobId, JobHandle>,
    telemetry: Option<TelemetryHandle>,
    ctx: SessionContext,
}

impl Session {
    pub(crate) fn new(id: SessionId, sender: EventSender, ctx: SessionContext) -> Self {
        Self {
            id,
            sender: Some(sender),
            jobs: HashMap::new(),
            telemetry: None,
            ctx,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_alive(&self) -> bool {
        self.sender.is_some()
    }

    /// Jobs that have not yet exited.
    pub fn active_job_count(&mut self) -> usize {
        self.prune_finished_jobs();
        self.jobs.len()
    }

    pub fn job(&self, job_id: &str) -> Option<&JobHandle> {
        self.jobs.get(job_id)
    }

    pub fn has_telemetry(&self) -> bool {
        self.telemetry.is_some()
    }

    /// Parse and dispatch one text frame. Malformed commands are logged and
    /// ignored.
    pub async fn handle_text(&mut self, text: &str) {
        match ClientCommand::parse(text) {
            Ok(command) => self.handle_command(command).await,
            Err(e) => {
                tracing::warn!(session_id = %self.id, error = %e, "Ignoring malformed command");
            }
        }
    }

    pub async fn handle_command(&mut self, command: ClientCommand) {
        if !self.is_alive() {
            tracing::debug!(session_id = %self.id, "Ignoring command on closed session");
            return;
        }

        match command {
            ClientCommand::MerkleComputeStart(params) => {
                self.start_tree_build(params);
            }
            ClientCommand::BenchmarkStart(params) => {
                self.start_benchmark(params);
            }
            ClientCommand::SubscribeMetrics => {
                self.subscribe_metrics();
            }
            ClientCommand::UnsubscribeMetrics => {
                self.unsubscribe_metrics();
            }
            ClientCommand::CancelJob(request) => {
                self.cancel_job(&request.job_id);
            }
            ClientCommand::ConfigUpdate(values) => self.update_config(values).await,
            ClientCommand::Message(message) => self.echo(message),
        }
    }

    /// Start a tree-build job. Invalid parameters are answered with a
    /// `merkle_update` error and no job is created.
    pub fn start_tree_build(&mut self, params: MerkleComputeStart) -> Option<JobId> {
        let sender = self.sender.clone()?;
        if let Err(e) = params.validate() {
            self.reject(ServerEvent::merkle(MerkleUpdate::error(None, 0.0, reason(&e))), &e);
            return None;
        }

        self.prune_finished_jobs();
        let job_id = new_id();
        tracing::debug!(
            session_id = %self.id,
            job_id = %job_id,
            item_count = params.item_count,
            config = %serde_json::Value::Object(params.config.clone()),
            "Starting tree build",
        );
        let driver = TreeBuildDriver::new(job_id.clone(), &params);
        let handle = spawn_job(job_id.clone(), driver, Arc::clone(&self.ctx.pacing), sender);
        self.jobs.insert(job_id.clone(), handle);
        Some(job_id)
    }

    /// Start a benchmark sweep. Invalid parameters are answered with a
    /// `benchmark_update` error and no job is created.
    pub fn start_benchmark(&mut self, params: BenchmarkStart) -> Option<JobId> {
        let sender = self.sender.clone()?;
        if let Err(e) = params.validate() {
            self.reject(ServerEvent::benchmark(BenchmarkUpdate::error(None, reason(&e))), &e);
            return None;
        }

        self.prune_finished_jobs();
        let job_id = new_id();
        tracing::debug!(
            session_id = %self.id,
            job_id = %job_id,
            sizes = params.sizes.len(),
            iterations = params.iterations,
            config = %serde_json::Value::Object(params.config.clone()),
            "Starting benchmark",
        );
        let driver = BenchmarkDriver::new(job_id.clone(), &params);
        let handle = spawn_job(job_id.clone(), driver, Arc::clone(&self.ctx.pacing), sender);
        self.jobs.insert(job_id.clone(), handle);
        Some(job_id)
    }

    /// Start the telemetry feed. Returns `false` if one is already active.
    pub fn subscribe_metrics(&mut self) -> bool {
        let Some(sender) = self.sender.clone() else {
            return false;
        };
        if self.telemetry.is_some() {
            tracing::debug!(session_id = %self.id, "Telemetry already subscribed");
            return false;
        }
        self.telemetry = Some(self.ctx.telemetry.subscribe(sender));
        tracing::info!(
            session_id = %self.id,
            interval_ms = self.ctx.telemetry.interval().as_millis() as u64,
            "Telemetry subscribed",
        );
        true
    }

    /// Stop the telemetry feed. Returns `false` if none was active.
    pub fn unsubscribe_metrics(&mut self) -> bool {
        match self.telemetry.take() {
            Some(handle) => {
                self.ctx.telemetry.unsubscribe(handle);
                tracing::info!(session_id = %self.id, "Telemetry unsubscribed");
                true
            }
            None => false,
        }
    }

    /// Cancel one job silently. Unknown ids are a no-op.
    pub fn cancel_job(&mut self, job_id: &str) -> bool {
        match self.jobs.remove(job_id) {
            Some(handle) => {
                handle.cancel();
                tracing::info!(session_id = %self.id, job_id, "Job stopped by client");
                true
            }
            None => false,
        }
    }

    async fn update_config(&mut self, values: Map<String, Value>) {
        let written = self.ctx.config_state.apply(&values).await;
        let delivered = self
            .ctx
            .hub
            .publish(ServerEvent::config(values), Some(self.id.as_str()))
            .await;
        tracing::info!(session_id = %self.id, keys = written, delivered, "Config updated");
    }

    fn echo(&self, message: IncomingMessage) {
        let sender_id = message.sender_id.unwrap_or_else(|| self.id.clone());
        self.send(ServerEvent::echo(message.text, sender_id));
    }

    fn reject(&self, event: ServerEvent, error: &CoreError) {
        tracing::warn!(session_id = %self.id, error = %error, "Rejected job parameters");
        self.send(event);
    }

    fn send(&self, event: ServerEvent) {
        if let Some(sender) = &self.sender {
            if sender.send(event).is_err() {
                tracing::debug!(session_id = %self.id, "Session channel closed");
            }
        }
    }

    fn prune_finished_jobs(&mut self) {
        self.jobs.retain(|_, handle| !handle.is_finished());
    }

    /// Cancel every producer and release the channel sender. Returns
    /// `None` if the session was already closed, otherwise the number of
    /// jobs cancelled and whether a telemetry feed was stopped.
    pub(crate) fn close(&mut self) -> Option<(usize, bool)> {
        let sender = self.sender.take()?;

        let mut cancelled_jobs = 0;
        for (_, handle) in self.jobs.drain() {
            if !handle.is_finished() {
                cancelled_jobs += 1;
            }
            handle.cancel();
        }
        let had_telemetry = self.unsubscribe_metrics();

        drop(sender);
        Some((cancelled_jobs, had_telemetry))
    }
}

impl Drop for Session {
    /// A session dropped without `disconnect` (a panicking or cancelled
    /// connection task) still stops its producers. The hub entry is removed
    /// on a spawned task since `unregister` is async.
    fn drop(&mut self) {
        let Some((cancelled_jobs, had_telemetry)) = self.close() else {
            return;
        };
        tracing::warn!(
            session_id = %self.id,
            cancelled_jobs,
            had_telemetry,
            "Session dropped without disconnect",
        );
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let hub = Arc::clone(&self.ctx.hub);
            let session_id = std::mem::take(&mut self.id);
            runtime.spawn(async move {
                hub.unregister(&session_id).await;
            });
        }
    }
}

/// Client-facing text for a rejected command.
fn reason(error: &CoreError) -> String {
    match error {
        CoreError::Validation(msg) => msg.clone(),
        other => other.to_string(),
    }
}
