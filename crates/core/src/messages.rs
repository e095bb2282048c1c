//! WebSocket message type constants and outbound event payloads.
//!
//! Every frame pushed to a client is a [`ServerEvent`] serialized as
//! `{"type": <event>, "data": {...}, "timestamp": <RFC 3339>}`. The payload
//! keeps its own `type` discriminator inside `data` so the envelope and the
//! payload never collide.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::metrics::MetricsSnapshot;
use crate::types::{JobId, SessionId, Timestamp};

/// Tree-build job lifecycle and progress updates.
pub const MSG_TYPE_MERKLE_UPDATE: &str = "merkle_update";

/// Benchmark sweep lifecycle and progress updates.
pub const MSG_TYPE_BENCHMARK_UPDATE: &str = "benchmark_update";

/// Periodic telemetry snapshot.
pub const MSG_TYPE_METRICS_UPDATE: &str = "metrics_update";

/// Shared configuration change, fanned out to every other session.
pub const MSG_TYPE_CONFIG_UPDATE: &str = "config_update";

/// Plain text message (welcome and echo).
pub const MSG_TYPE_MESSAGE: &str = "message";

/// Sender id used for messages the server originates itself.
pub const SERVER_SENDER_ID: &str = "server";

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Outbound event envelope.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ServerEvent {
    #[serde(flatten)]
    pub payload: EventPayload,
    pub timestamp: Timestamp,
}

/// The event taxonomy delivered over a client connection.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    MerkleUpdate(MerkleUpdate),
    BenchmarkUpdate(BenchmarkUpdate),
    MetricsUpdate(MetricsSnapshot),
    ConfigUpdate(Map<String, Value>),
    Message(ChatMessage),
}

impl ServerEvent {
    /// Wrap a payload in an envelope stamped with the current time.
    pub fn new(payload: EventPayload) -> Self {
        Self {
            payload,
            timestamp: chrono::Utc::now(),
        }
    }

    /// The welcome message enqueued for every new session.
    pub fn welcome(session_id: &str) -> Self {
        Self::new(EventPayload::Message(ChatMessage {
            text: format!("Connected to server with id {session_id}"),
            sender_id: SERVER_SENDER_ID.to_string(),
            timestamp: chrono::Utc::now(),
        }))
    }

    pub fn merkle(update: MerkleUpdate) -> Self {
        Self::new(EventPayload::MerkleUpdate(update))
    }

    pub fn benchmark(update: BenchmarkUpdate) -> Self {
        Self::new(EventPayload::BenchmarkUpdate(update))
    }

    pub fn metrics(snapshot: MetricsSnapshot) -> Self {
        Self::new(EventPayload::MetricsUpdate(snapshot))
    }

    pub fn config(values: Map<String, Value>) -> Self {
        Self::new(EventPayload::ConfigUpdate(values))
    }

    /// Echo a client message back, attributed to its sender.
    pub fn echo(text: String, sender_id: SessionId) -> Self {
        Self::new(EventPayload::Message(ChatMessage {
            text,
            sender_id,
            timestamp: chrono::Utc::now(),
        }))
    }

    /// The envelope-level `type` string for this event.
    pub fn event_type(&self) -> &'static str {
        match self.payload {
            EventPayload::MerkleUpdate(_) => MSG_TYPE_MERKLE_UPDATE,
            EventPayload::BenchmarkUpdate(_) => MSG_TYPE_BENCHMARK_UPDATE,
            EventPayload::MetricsUpdate(_) => MSG_TYPE_METRICS_UPDATE,
            EventPayload::ConfigUpdate(_) => MSG_TYPE_CONFIG_UPDATE,
            EventPayload::Message(_) => MSG_TYPE_MESSAGE,
        }
    }
}

// ---------------------------------------------------------------------------
// merkle_update
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MerkleUpdateKind {
    TreeStart,
    Progress,
    /// Reserved for backing computations that report individual nodes.
    NodeComputed,
    TreeComplete,
    Error,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MerkleUpdate {
    #[serde(rename = "type")]
    pub kind: MerkleUpdateKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_node: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computed_nodes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_nodes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MerkleUpdate {
    /// A bare update of the given kind; callers fill in the optional fields.
    pub fn new(kind: MerkleUpdateKind, job_id: Option<JobId>, progress: f64) -> Self {
        Self {
            kind,
            job_id,
            progress,
            current_node: None,
            computed_nodes: None,
            total_nodes: None,
            message: None,
        }
    }

    /// A terminal error update.
    pub fn error(job_id: Option<JobId>, progress: f64, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(MerkleUpdateKind::Error, job_id, progress)
        }
    }
}

// ---------------------------------------------------------------------------
// benchmark_update
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkUpdateKind {
    BenchmarkStart,
    BenchmarkProgress,
    BenchmarkComplete,
    BenchmarkError,
}

/// Outcome of a single `(size, iteration)` unit of a sweep.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkResult {
    pub size: u64,
    pub size_index: usize,
    /// 1-based.
    pub iteration: u32,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkUpdate {
    #[serde(rename = "type")]
    pub kind: BenchmarkUpdateKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_sizes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_iteration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_iterations: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<BenchmarkResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BenchmarkUpdate {
    pub fn new(kind: BenchmarkUpdateKind, job_id: Option<JobId>) -> Self {
        Self {
            kind,
            job_id,
            current_size: None,
            size_index: None,
            total_sizes: None,
            current_iteration: None,
            total_iterations: None,
            results: None,
            message: None,
        }
    }

    pub fn error(job_id: Option<JobId>, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(BenchmarkUpdateKind::BenchmarkError, job_id)
        }
    }
}

// ---------------------------------------------------------------------------
// message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub text: String,
    pub sender_id: String,
    pub timestamp: Timestamp,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_nests_payload_under_data() {
        let mut update = MerkleUpdate::new(MerkleUpdateKind::Progress, Some("job-1".into()), 42.5);
        update.total_nodes = Some(15);
        let json = serde_json::to_value(ServerEvent::merkle(update)).unwrap();

        assert_eq!(json["type"], MSG_TYPE_MERKLE_UPDATE);
        assert_eq!(json["data"]["type"], "progress");
        assert_eq!(json["data"]["jobId"], "job-1");
        assert_eq!(json["data"]["progress"], 42.5);
        assert_eq!(json["data"]["totalNodes"], 15);
        assert!(json["data"].get("message").is_none());
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn benchmark_error_carries_message() {
        let json =
            serde_json::to_value(ServerEvent::benchmark(BenchmarkUpdate::error(None, "bad sizes")))
                .unwrap();

        assert_eq!(json["type"], MSG_TYPE_BENCHMARK_UPDATE);
        assert_eq!(json["data"]["type"], "benchmark_error");
        assert_eq!(json["data"]["message"], "bad sizes");
        assert!(json["data"].get("jobId").is_none());
    }

    #[test]
    fn config_update_payload_is_opaque_mapping() {
        let mut values = Map::new();
        values.insert("theme".into(), Value::String("dark".into()));
        let event = ServerEvent::config(values);

        assert_eq!(event.event_type(), MSG_TYPE_CONFIG_UPDATE);
        let json = serde_json::to_value(event).unwrap();
        assert_eq!(json["data"]["theme"], "dark");
    }

    #[test]
    fn welcome_is_a_server_message() {
        let json = serde_json::to_value(ServerEvent::welcome("abc")).unwrap();

        assert_eq!(json["type"], MSG_TYPE_MESSAGE);
        assert_eq!(json["data"]["senderId"], SERVER_SENDER_ID);
        assert!(json["data"]["text"].as_str().unwrap().contains("abc"));
    }
}
