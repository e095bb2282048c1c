//! Pulse domain core.
//!
//! Pure building blocks shared by the event hub and the server: identifiers,
//! the error type, the wire vocabulary (outbound events and inbound
//! commands), the job state machine, pacing policies and metrics sources.
//! Nothing in this crate performs I/O or spawns tasks.

pub mod commands;
pub mod error;
pub mod job;
pub mod messages;
pub mod metrics;
pub mod pacing;
pub mod types;
