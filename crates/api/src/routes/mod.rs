pub mod health;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// WebSocket upgrade endpoint.
pub fn ws_router() -> Router<AppState> {
    Router::new().route("/ws", get(ws::ws_handler))
}
