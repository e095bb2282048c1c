//! Connection gateway: creates sessions on connect and tears them down on
//! disconnect.

use pulse_core::messages::ServerEvent;
use pulse_core::types::new_id;
use pulse_events::EventReceiver;
use tokio::sync::mpsc;

use super::session::{Session, SessionContext};

#[derive(Clone)]
pub struct ConnectionGateway {
    ctx: SessionContext,
}

impl ConnectionGateway {
    pub fn new(ctx: SessionContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Allocate a session and register it with the hub.
    ///
    /// The welcome message is enqueued before registration, so it is always
    /// the first event on the returned receiver.
    pub async fn connect(&self) -> (Session, EventReceiver) {
        let session_id = new_id();
        let (sender, receiver) = mpsc::unbounded_channel();

        let _ = sender.send(ServerEvent::welcome(&session_id));
        self.ctx.hub.register(session_id.clone(), sender.clone()).await;
        tracing::info!(session_id = %session_id, "Session connected");

        (Session::new(session_id, sender, self.ctx.clone()), receiver)
    }

    /// Release the session from the hub, then cancel every producer it owns.
    ///
    /// Unregistering first keeps broadcasts from landing in a channel that is
    /// about to close. Idempotent: disconnecting a closed session does nothing.
    pub async fn disconnect(&self, session: &mut Session) {
        if !session.is_alive() {
            return;
        }
        self.ctx.hub.unregister(session.id()).await;
        let Some((cancelled_jobs, had_telemetry)) = session.close() else {
            return;
        };
        tracing::info!(
            session_id = %session.id(),
            cancelled_jobs,
            had_telemetry,
            "Session disconnected",
        );
    }

    /// Resolves once the server starts shutting down.
    pub async fn shutdown_requested(&self) {
        self.ctx.hub.shutdown_requested().await;
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.ctx.hub.session_count().await
    }
}
