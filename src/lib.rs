//! Pagebridge library.
//!
//! A privileged coordinator invokes named, schema-validated tools exposed by
//! untrusted page content across process boundaries. This crate wires the
//! workspace services together: the session registry (connection and
//! pending-call state), the injection sequencer (navigation-driven
//! bootstrap) and the page-side capability surface.

pub mod bridge;
pub mod config;
pub mod surface;

pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use surface::{PageToolSurface, ToolArgs};

pub use pagebridge_capability_registry::{CapabilityRegistry, FnExecutor, ToolExecutor, ToolSpec};
pub use pagebridge_injection_sequencer::{
    ExecutionContext, InjectionPayload, InjectionSequencer, Injector, SequencerConfig, Timing,
    ToolSource, ToolSourceStore,
};
pub use pagebridge_core_types::{BridgeError, CallId, ChannelId, FrameId, PageId, SchemaIssue};
pub use pagebridge_protocol::{CapabilitySnapshot, Envelope, Message, ToolSummary};
pub use pagebridge_session_registry::{Channel, SessionConfig, SessionRegistry};
pub use pagebridge_script_meta::SourceKind;
