use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::oneshot;

use pagebridge_core_types::{BridgeError, CallId, ChannelId, PageId};
use pagebridge_protocol::{CapabilitySnapshot, Envelope};

use crate::channel::Channel;

/// An outstanding invocation awaiting exactly one terminal resolution:
/// matching response, cancellation or timeout.
pub(crate) struct PendingCall {
    pub page: PageId,
    pub resolver: oneshot::Sender<Result<Value, BridgeError>>,
    pub issued_at: Instant,
}

impl PendingCall {
    /// Consume the call with its terminal outcome. The receiver may already
    /// have gone away (the awaiter timed out); that is not an error here.
    pub fn resolve(self, outcome: Result<Value, BridgeError>) {
        let _ = self.resolver.send(outcome);
    }
}

/// Connection state for one page instance.
pub(crate) struct PageSession {
    pub page: PageId,
    pub channel: Option<(ChannelId, Arc<dyn Channel>)>,
    pub queue: VecDeque<Envelope>,
    pub pending: HashMap<CallId, PendingCall>,
    pub snapshot: Option<CapabilitySnapshot>,
    pub bootstrap_requested: bool,
}

impl PageSession {
    pub fn new(page: PageId) -> Self {
        Self {
            page,
            channel: None,
            queue: VecDeque::new(),
            pending: HashMap::new(),
            snapshot: None,
            bootstrap_requested: false,
        }
    }

    pub fn drain_pending(&mut self) -> Vec<(CallId, PendingCall)> {
        self.pending.drain().collect()
    }
}
