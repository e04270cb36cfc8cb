//! Injection sequencer: orders the bootstrap of page-side capabilities
//! around navigation.
//!
//! Per page the lifecycle is Idle → NavigationPending → Bootstrapping → Idle.
//! Navigation start cancels in-flight calls and arms a pending-bootstrap
//! marker; readiness consumes the marker and injects, in strict order, the
//! relay shim, the capability polyfill, applicable built-in tools, the
//! announcer and finally applicable external tools.

pub mod config;
pub mod model;
pub mod sequencer;
pub mod store;

pub use config::SequencerConfig;
pub use model::{ExecutionContext, InjectionPayload, Injector, Timing};
pub use sequencer::InjectionSequencer;
pub use store::{ToolSource, ToolSourceStore};
