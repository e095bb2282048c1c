use std::sync::Arc;

use pulse_core::metrics::SyntheticMetrics;
use pulse_events::{BroadcastHub, ConfigState};

use crate::config::ServerConfig;
use crate::engine::TelemetryPublisher;
use crate::ws::{ConnectionGateway, SessionContext};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Session registry used for config fan-out and shutdown.
    pub hub: Arc<BroadcastHub>,
    /// Process-wide configuration values written by `config_update`.
    pub config_state: Arc<ConfigState>,
    /// Creates and tears down WebSocket sessions.
    pub gateway: ConnectionGateway,
}

impl AppState {
    /// Wire up the process-wide services from configuration, with the
    /// synthetic telemetry source.
    pub fn new(config: ServerConfig) -> Self {
        let hub = Arc::new(BroadcastHub::new());
        let config_state = Arc::new(ConfigState::new());
        let telemetry =
            TelemetryPublisher::new(Arc::new(SyntheticMetrics::default()), config.metrics_interval);

        let gateway = ConnectionGateway::new(SessionContext {
            hub: Arc::clone(&hub),
            config_state: Arc::clone(&config_state),
            pacing: Arc::new(config.pacing.clone()),
            telemetry,
        });

        Self {
            config: Arc::new(config),
            hub,
            config_state,
            gateway,
        }
    }
}
