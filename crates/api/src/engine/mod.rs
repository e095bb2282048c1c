//! Event producers.
//!
//! Contains the shared job runner with its tree-build and benchmark
//! drivers, and the telemetry publisher. Each producer is a spawned task
//! that emits into one session's channel and stops on explicit
//! cancellation.

pub mod benchmark;
pub mod producer;
pub mod runner;
pub mod telemetry;
pub mod tree_build;

pub use runner::{spawn_job, JobDriver, JobHandle, Step};
pub use telemetry::{TelemetryHandle, TelemetryPublisher};
