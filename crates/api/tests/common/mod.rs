#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use pulse_core::messages::{EventPayload, ServerEvent};
use pulse_core::metrics::SyntheticMetrics;
use pulse_core::pacing::{FixedPacing, PacingPolicy, RandomPacing};
use pulse_events::{BroadcastHub, ConfigState, EventReceiver};
use tower::ServiceExt;

use pulse_api::config::ServerConfig;
use pulse_api::engine::TelemetryPublisher;
use pulse_api::router::build_app_router;
use pulse_api::state::AppState;
use pulse_api::ws::{ConnectionGateway, SessionContext};

/// Build a test `ServerConfig` with safe defaults and fast pacing.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        ws_ping_interval: Duration::from_secs(30),
        pacing: RandomPacing::new(
            Duration::from_millis(5),
            25.0,
            Duration::from_millis(1),
            Duration::from_millis(5),
        )
        .unwrap(),
        metrics_interval: Duration::from_millis(50),
    }
}

/// Build the application router with the production middleware stack.
pub fn build_test_app() -> (Router, AppState) {
    let state = AppState::new(test_config());
    (build_app_router(state.clone()), state)
}

/// Deterministic pacing: 10 points per tree tick, fixed benchmark delay.
pub fn fixed_pacing() -> FixedPacing {
    FixedPacing {
        tick: Duration::from_millis(100),
        increment: 10.0,
        delay: Duration::from_millis(250),
    }
}

/// A gateway wired to fresh process-wide services.
pub fn test_gateway(pacing: impl PacingPolicy + 'static, metrics_interval: Duration) -> ConnectionGateway {
    ConnectionGateway::new(SessionContext {
        hub: Arc::new(BroadcastHub::new()),
        config_state: Arc::new(ConfigState::new()),
        pacing: Arc::new(pacing),
        telemetry: TelemetryPublisher::new(Arc::new(SyntheticMetrics::default()), metrics_interval),
    })
}

/// Send a GET request to the given URI and return the response.
pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

/// Read the response body as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Receive every event until the channel closes.
pub async fn drain(rx: &mut EventReceiver) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

/// Receive the next event, failing the test if none arrives within `within`.
pub async fn next_event(rx: &mut EventReceiver, within: Duration) -> ServerEvent {
    tokio::time::timeout(within, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("channel closed")
}

/// Assert that no event arrives within `window`.
pub async fn assert_quiet(rx: &mut EventReceiver, window: Duration) {
    if let Ok(Some(event)) = tokio::time::timeout(window, rx.recv()).await {
        panic!("unexpected event: {event:?}");
    }
}

pub fn is_welcome(event: &ServerEvent) -> bool {
    matches!(&event.payload, EventPayload::Message(m) if m.sender_id == "server")
}
