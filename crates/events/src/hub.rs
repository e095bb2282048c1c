//! Process-wide session registry and fan-out.
//!
//! [`BroadcastHub`] owns one delivery channel per live session. Producers
//! never touch sockets: they push [`ServerEvent`]s into a session's channel
//! and the connection's writer task drains it.

use std::collections::HashMap;

use pulse_core::messages::ServerEvent;
use pulse_core::types::SessionId;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

/// Channel sender half for pushing events to a session.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Channel receiver half drained by a session's writer task.
pub type EventReceiver = mpsc::UnboundedReceiver<ServerEvent>;

/// Registry of live sessions.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application.
pub struct BroadcastHub {
    sessions: RwLock<HashMap<SessionId, EventSender>>,
    shutdown: CancellationToken,
}

impl BroadcastHub {
    /// Create a new, empty hub.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Register a session's delivery channel.
    ///
    /// Re-registering an id replaces the previous sender.
    pub async fn register(&self, session_id: SessionId, sender: EventSender) {
        self.sessions.write().await.insert(session_id, sender);
    }

    /// Remove a session. Unknown ids are a no-op.
    pub async fn unregister(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
    }

    /// Deliver `event` to every live session except `origin`.
    ///
    /// Sessions whose channels are closed (mid-disconnect) are skipped; the
    /// failure is logged and never reported to the publisher. Returns the
    /// number of sessions the event was handed to.
    pub async fn publish(&self, event: ServerEvent, origin: Option<&str>) -> usize {
        let sessions = self.sessions.read().await;
        let mut delivered = 0;
        for (session_id, sender) in sessions.iter() {
            if origin == Some(session_id.as_str()) {
                continue;
            }
            if sender.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                tracing::debug!(
                    session_id = %session_id,
                    event_type = event.event_type(),
                    "Skipping closed session during broadcast",
                );
            }
        }
        tracing::debug!(
            event_type = event.event_type(),
            origin = origin.unwrap_or("-"),
            delivered,
            "Broadcast event",
        );
        delivered
    }

    /// Deliver `event` to a single session. Returns whether it was accepted.
    pub async fn send_to(&self, session_id: &str, event: ServerEvent) -> bool {
        match self.sessions.read().await.get(session_id) {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    /// Whether a session is currently registered.
    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    /// Return the current number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Resolves once [`shutdown_all`](Self::shutdown_all) has been called.
    ///
    /// Connection tasks select on this and disconnect their session, which
    /// closes the session channel and makes the writer send a Close frame.
    pub async fn shutdown_requested(&self) {
        self.shutdown.cancelled().await;
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Signal every connection to close and drop the hub's delivery channels.
    pub async fn shutdown_all(&self) {
        self.shutdown.cancel();
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        sessions.clear();
        tracing::info!(count, "Released all session channels");
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pulse_core::messages::EventPayload;
    use serde_json::{json, Map, Value};

    use super::*;

    fn config_event(key: &str, value: Value) -> ServerEvent {
        let mut values = Map::new();
        values.insert(key.to_string(), value);
        ServerEvent::config(values)
    }

    async fn register(hub: &BroadcastHub, id: &str) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        hub.register(id.to_string(), tx).await;
        rx
    }

    #[tokio::test]
    async fn register_and_unregister_track_count() {
        let hub = BroadcastHub::new();
        assert_eq!(hub.session_count().await, 0);

        let _rx = register(&hub, "s1").await;
        assert_eq!(hub.session_count().await, 1);
        assert!(hub.contains("s1").await);

        hub.unregister("s1").await;
        hub.unregister("s1").await;
        assert_eq!(hub.session_count().await, 0);
    }

    #[tokio::test]
    async fn publish_skips_origin() {
        let hub = BroadcastHub::new();
        let mut rx1 = register(&hub, "s1").await;
        let mut rx2 = register(&hub, "s2").await;
        let mut rx3 = register(&hub, "s3").await;

        let delivered = hub.publish(config_event("theme", json!("dark")), Some("s1")).await;
        assert_eq!(delivered, 2);

        for rx in [&mut rx2, &mut rx3] {
            let event = rx.recv().await.expect("peer should receive the update");
            assert_matches!(event.payload, EventPayload::ConfigUpdate(values) => {
                assert_eq!(values["theme"], "dark");
            });
        }
        assert!(rx1.try_recv().is_err(), "origin must not receive its own update");
    }

    #[tokio::test]
    async fn publish_survives_closed_channel() {
        let hub = BroadcastHub::new();
        let _rx1 = register(&hub, "s1").await;
        let rx2 = register(&hub, "s2").await;
        let mut rx3 = register(&hub, "s3").await;

        // s2 is mid-disconnect: its receiver is gone but it is still registered.
        drop(rx2);

        let delivered = hub.publish(config_event("k", json!(1)), Some("s1")).await;
        assert_eq!(delivered, 1);
        assert!(rx3.recv().await.is_some());
    }

    #[tokio::test]
    async fn publish_without_origin_reaches_everyone() {
        let hub = BroadcastHub::new();
        let mut rx1 = register(&hub, "s1").await;
        let mut rx2 = register(&hub, "s2").await;

        assert_eq!(hub.publish(config_event("k", json!(true)), None).await, 2);
        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }

    #[tokio::test]
    async fn send_to_targets_one_session() {
        let hub = BroadcastHub::new();
        let mut rx1 = register(&hub, "s1").await;
        let mut rx2 = register(&hub, "s2").await;

        assert!(hub.send_to("s2", ServerEvent::welcome("s2")).await);
        assert!(!hub.send_to("missing", ServerEvent::welcome("missing")).await);

        assert!(rx2.recv().await.is_some());
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn shutdown_all_closes_channels() {
        let hub = BroadcastHub::new();
        let mut rx1 = register(&hub, "s1").await;

        hub.shutdown_all().await;

        assert_eq!(hub.session_count().await, 0);
        assert!(rx1.recv().await.is_none(), "channel should be closed after shutdown");
    }

    #[tokio::test]
    async fn shutdown_all_wakes_waiting_connections() {
        let hub = std::sync::Arc::new(BroadcastHub::new());
        assert!(!hub.is_shutting_down());

        let waiter = tokio::spawn({
            let hub = std::sync::Arc::clone(&hub);
            async move { hub.shutdown_requested().await }
        });

        hub.shutdown_all().await;

        assert!(hub.is_shutting_down());
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake on shutdown")
            .unwrap();
    }
}
