//! WebSocket infrastructure for real-time progress and telemetry.
//!
//! Provides the connection gateway, per-connection sessions, and the HTTP
//! upgrade handler used by Axum routes.

pub mod gateway;
mod handler;
pub mod session;

pub use gateway::ConnectionGateway;
pub use handler::ws_handler;
pub use session::{Session, SessionContext};
