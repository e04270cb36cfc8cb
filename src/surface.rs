//! Page-side public surface.
//!
//! One combined, legacy-compatible facade exposes both halves of the page
//! API: the author-facing registration calls (`provide_all`, `register`,
//! `unregister`, `clear`) and the coordinator-facing calls (`list`,
//! `invoke`, change subscription). It also answers protocol envelopes the
//! relay delivers, which is how `tools/call` and `tools/list` reach the
//! registry.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use pagebridge_capability_registry::{CapabilityRegistry, ToolSpec};
use pagebridge_core_types::{BridgeError, SchemaIssue};
use pagebridge_protocol::{
    CapabilitySnapshot, Envelope, Message, ToolSummary, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST,
};

/// Arguments arrive either as structured data or as a serialized JSON
/// string; both forms validate against the same schema.
#[derive(Clone, Debug)]
pub enum ToolArgs {
    Structured(Value),
    Serialized(String),
}

impl ToolArgs {
    fn into_value(self) -> Result<Value, BridgeError> {
        match self {
            Self::Structured(value) => Ok(value),
            Self::Serialized(text) => serde_json::from_str(&text).map_err(|err| {
                BridgeError::Validation(vec![SchemaIssue::new(
                    "",
                    format!("arguments are not valid JSON: {err}"),
                )])
            }),
        }
    }
}

/// Combined page-side surface over one capability registry.
pub struct PageToolSurface {
    registry: Arc<CapabilityRegistry>,
    origin: String,
}

impl PageToolSurface {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            registry: Arc::new(CapabilityRegistry::new()),
            origin: origin.into(),
        }
    }

    pub fn registry(&self) -> Arc<CapabilityRegistry> {
        self.registry.clone()
    }

    // author-facing half

    pub fn provide_all(&self, tools: Vec<ToolSpec>) -> Result<(), BridgeError> {
        self.registry.replace_all(tools)
    }

    pub fn register(&self, tool: ToolSpec) -> Result<(), BridgeError> {
        self.registry.register(tool)
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.registry.unregister(name)
    }

    pub fn clear(&self) {
        self.registry.clear()
    }

    // coordinator-facing half

    pub fn list(&self) -> Vec<ToolSummary> {
        self.registry.list()
    }

    pub async fn invoke(&self, name: &str, args: ToolArgs) -> Result<Value, BridgeError> {
        self.registry.invoke(name, args.into_value()?).await
    }

    pub fn on_changed(&self) -> broadcast::Receiver<Vec<ToolSummary>> {
        self.registry.subscribe()
    }

    /// Build the snapshot the announcer emits. `initial` marks the first
    /// announcement after bootstrap; `requested` marks a resync reply.
    pub fn snapshot(&self, initial: bool, requested: bool) -> CapabilitySnapshot {
        let mut snapshot = CapabilitySnapshot::new(self.registry.list(), self.origin.clone());
        snapshot.initial = initial;
        snapshot.requested = requested;
        snapshot
    }

    /// Answer one envelope from the relay. `tools/call` yields exactly one
    /// response; `tools/list` yields a `tools/listChanged` notification (the
    /// resync path reuses the ordinary announcement shape); everything else
    /// yields nothing.
    pub async fn handle_envelope(&self, envelope: Envelope) -> Option<Envelope> {
        match envelope.classify() {
            Message::Request { id, method, params } if method == METHOD_TOOLS_CALL => {
                let name = params
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let args = params.get("arguments").cloned().unwrap_or(Value::Null);
                match self.registry.invoke(&name, args).await {
                    Ok(result) => Some(Envelope::response_ok(id, result)),
                    Err(err) => Some(Envelope::response_err(id, err.to_string())),
                }
            }
            Message::Request { method, .. } if method == METHOD_TOOLS_LIST => {
                // answered through the notification path, never directly
                Some(Envelope::list_changed(&self.snapshot(false, true)))
            }
            other => {
                debug!(target: "pagebridge", ?other, "surface ignoring envelope");
                None
            }
        }
    }
}
