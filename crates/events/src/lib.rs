//! Pulse shared state and fan-out.
//!
//! - [`BroadcastHub`]: registry of live sessions with push-based delivery
//!   through per-session channels.
//! - [`ConfigState`]: process-wide configuration mapping, last writer wins.

pub mod config_state;
pub mod hub;

pub use config_state::ConfigState;
pub use hub::{BroadcastHub, EventReceiver, EventSender};
