use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use pagebridge_core_types::BridgeError;
use pagebridge_protocol::ToolSummary;

use crate::errors::RegistryError;
use crate::model::{ToolDescriptor, ToolSpec};

/// Page-side tool store. Explicitly constructed and injected rather than a
/// process-wide singleton, so each page context owns exactly one.
pub struct CapabilityRegistry {
    tools: RwLock<BTreeMap<String, ToolDescriptor>>,
    changes: broadcast::Sender<Vec<ToolSummary>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            tools: RwLock::new(BTreeMap::new()),
            changes,
        }
    }

    /// Observe change notifications. Each one carries the full summary list.
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<ToolSummary>> {
        self.changes.subscribe()
    }

    /// Atomic wholesale replacement. A batch containing duplicate names
    /// rejects the whole call and leaves the previous set untouched.
    pub fn replace_all(&self, specs: Vec<ToolSpec>) -> Result<(), BridgeError> {
        let mut staged = BTreeMap::new();
        for spec in specs {
            let descriptor = vet(spec)?;
            if staged.contains_key(&descriptor.name) {
                return Err(RegistryError::DuplicateName(descriptor.name).into());
            }
            staged.insert(descriptor.name.clone(), descriptor);
        }
        *self.tools.write() = staged;
        self.schedule_notify();
        Ok(())
    }

    /// Additive upsert. Replacing an existing name is allowed but logged.
    pub fn register(&self, spec: ToolSpec) -> Result<(), BridgeError> {
        let descriptor = vet(spec)?;
        let replaced = self
            .tools
            .write()
            .insert(descriptor.name.clone(), descriptor.clone())
            .is_some();
        if replaced {
            warn!(target: "capability-registry", name = %descriptor.name, "tool replaced an existing registration");
        }
        self.schedule_notify();
        Ok(())
    }

    /// Removes a tool, reporting whether it existed.
    pub fn unregister(&self, name: &str) -> bool {
        let existed = self.tools.write().remove(name).is_some();
        if existed {
            self.schedule_notify();
        }
        existed
    }

    pub fn clear(&self) {
        let was_empty = {
            let mut tools = self.tools.write();
            let was_empty = tools.is_empty();
            tools.clear();
            was_empty
        };
        if !was_empty {
            self.schedule_notify();
        }
    }

    pub fn list(&self) -> Vec<ToolSummary> {
        self.tools
            .read()
            .values()
            .map(ToolDescriptor::summary)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }

    /// Validate arguments against the tool's schema, then run the executor.
    pub async fn invoke(&self, name: &str, args: Value) -> Result<Value, BridgeError> {
        let descriptor = self
            .tools
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(name.to_string()))?;

        pagebridge_schema_validator::check(&descriptor.input_schema, &args)?;

        match descriptor.executor.execute(args).await {
            Ok(result) => Ok(result),
            Err(BridgeError::Execution(cause)) => Err(BridgeError::Execution(cause)),
            Err(other) => Err(BridgeError::execution(other)),
        }
    }

    /// Every state change schedules its own deferred notification. Bursts of
    /// synchronous mutations are not coalesced; each mutation produces one
    /// notification carrying the list as of its send. Without an ambient
    /// runtime the notification is delivered inline instead of deferred.
    fn schedule_notify(&self) {
        let summaries = self.list();
        let changes = self.changes.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if changes.send(summaries).is_err() {
                        debug!(target: "capability-registry", "change notification dropped: no subscribers");
                    }
                });
            }
            Err(_) => {
                if changes.send(summaries).is_err() {
                    debug!(target: "capability-registry", "change notification dropped: no subscribers");
                }
            }
        }
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn vet(spec: ToolSpec) -> Result<ToolDescriptor, BridgeError> {
    if spec.name.is_empty() {
        return Err(RegistryError::EmptyName.into());
    }
    if spec.description.is_empty() {
        return Err(RegistryError::EmptyDescription(spec.name).into());
    }
    Ok(ToolDescriptor {
        input_schema: spec
            .input_schema
            .unwrap_or_else(pagebridge_schema_validator::unconstrained_object),
        name: spec.name,
        description: spec.description,
        executor: spec.executor,
    })
}
