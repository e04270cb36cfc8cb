//! Session registry: sole owner of per-page connection and pending-call
//! state.
//!
//! One logical connection exists per page instance. Establishing a new
//! channel retires the previous one and cancels its orphaned pending calls;
//! messages addressed to a retired channel are lost by construction, so the
//! registry never leaves them to time out.

pub mod channel;
pub mod config;
pub mod model;
pub mod state;

pub use channel::Channel;
pub use config::SessionConfig;
pub use state::SessionRegistry;
