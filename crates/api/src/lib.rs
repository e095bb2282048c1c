//! Pulse API server library.
//!
//! Exposes the building blocks (config, state, router, job engine,
//! WebSocket gateway) so integration tests and the binary entrypoint can
//! both access them.

pub mod config;
pub mod engine;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
