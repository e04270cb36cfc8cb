use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use pagebridge_core_types::{BridgeError, CallId, ChannelId, PageId};
use pagebridge_protocol::{CapabilitySnapshot, Envelope, Message, METHOD_TOOLS_LIST_CHANGED};

use crate::channel::Channel;
use crate::config::SessionConfig;
use crate::model::{PageSession, PendingCall};

/// Owns every per-page session. All mutation of connection and pending-call
/// state funnels through this type; no other component touches it.
pub struct SessionRegistry {
    sessions: DashMap<PageId, Arc<Mutex<PageSession>>>,
    config: SessionConfig,
    next_channel: AtomicU64,
    snapshots: broadcast::Sender<(PageId, CapabilitySnapshot)>,
    bootstrap_tx: mpsc::UnboundedSender<PageId>,
}

impl SessionRegistry {
    /// Construct the registry plus the stream of bootstrap requests emitted
    /// when a message is queued for a page with no channel.
    pub fn new(config: SessionConfig) -> (Arc<Self>, mpsc::UnboundedReceiver<PageId>) {
        let (bootstrap_tx, bootstrap_rx) = mpsc::unbounded_channel();
        let (snapshots, _) = broadcast::channel(64);
        let registry = Arc::new(Self {
            sessions: DashMap::new(),
            config,
            next_channel: AtomicU64::new(0),
            snapshots,
            bootstrap_tx,
        });
        (registry, bootstrap_rx)
    }

    fn session(&self, page: PageId) -> Arc<Mutex<PageSession>> {
        self.sessions
            .entry(page)
            .or_insert_with(|| Arc::new(Mutex::new(PageSession::new(page))))
            .value()
            .clone()
    }

    /// Observe capability snapshots as they arrive from pages.
    pub fn subscribe_snapshots(&self) -> broadcast::Receiver<(PageId, CapabilitySnapshot)> {
        self.snapshots.subscribe()
    }

    /// Attach a channel, retiring any previous one. Queued messages flush in
    /// FIFO order, then a capability resync request goes out: a coordinator
    /// restart loses the cached snapshots, and the page answers the resync
    /// exactly as it answers an initial snapshot request.
    pub async fn connect(&self, page: PageId, channel: Arc<dyn Channel>) -> ChannelId {
        let epoch = ChannelId(self.next_channel.fetch_add(1, Ordering::Relaxed) + 1);
        let session = self.session(page);

        let (retired, orphaned, queued) = {
            let mut guard = session.lock();
            let retired = guard.channel.take();
            let orphaned = if retired.is_some() {
                guard.drain_pending()
            } else {
                Vec::new()
            };
            guard.channel = Some((epoch, channel.clone()));
            guard.bootstrap_requested = false;
            let queued: Vec<Envelope> = guard.queue.drain(..).collect();
            (retired, orphaned, queued)
        };

        if let Some((old_epoch, _)) = retired {
            info!(target: "session-registry", %page, ?old_epoch, ?epoch, "channel replaced");
        }
        for (id, call) in orphaned {
            debug!(target: "session-registry", %page, %id, "cancelling call orphaned by channel replacement");
            call.resolve(Err(BridgeError::cancelled("channel replaced")));
        }

        for envelope in queued {
            if let Err(err) = channel.send(envelope).await {
                warn!(target: "session-registry", %page, %err, "failed to flush queued message");
            }
        }

        let resync = Envelope::list_request(CallId::new());
        if let Err(err) = channel.send(resync).await {
            warn!(target: "session-registry", %page, %err, "failed to send capability resync");
        }

        epoch
    }

    /// Detach a channel if it is still the registered one. Pending calls are
    /// cancelled; the cached snapshot survives so a reconnect within the same
    /// navigation does not lose known tools.
    pub fn disconnect(&self, page: PageId, epoch: ChannelId) {
        let Some(session) = self.sessions.get(&page).map(|s| s.value().clone()) else {
            return;
        };
        let orphaned = {
            let mut guard = session.lock();
            match guard.channel {
                Some((current, _)) if current == epoch => {
                    guard.channel = None;
                    guard.drain_pending()
                }
                _ => return, // a newer channel already took over
            }
        };
        for (id, call) in orphaned {
            debug!(target: "session-registry", %page, %id, "cancelling call on disconnect");
            call.resolve(Err(BridgeError::cancelled("channel closed")));
        }
    }

    /// Send immediately when connected; otherwise queue (bounded, oldest
    /// dropped) and request a bootstrap for the page.
    pub async fn send(&self, page: PageId, envelope: Envelope) -> Result<(), BridgeError> {
        let session = self.session(page);
        let channel = {
            let mut guard = session.lock();
            match &guard.channel {
                Some((_, channel)) => Some(channel.clone()),
                None => {
                    if guard.queue.len() >= self.config.queue_bound {
                        guard.queue.pop_front();
                        warn!(target: "session-registry", %page, "queue bound hit, dropping oldest message");
                    }
                    guard.queue.push_back(envelope.clone());
                    if !guard.bootstrap_requested {
                        guard.bootstrap_requested = true;
                        let _ = self.bootstrap_tx.send(page);
                    }
                    None
                }
            }
        };
        match channel {
            Some(channel) => channel.send(envelope).await,
            None => Ok(()),
        }
    }

    /// Invoke a tool on the page. Fails immediately (no queueing) when no
    /// channel is attached. Exactly one terminal outcome reaches the caller.
    pub async fn call_tool(
        &self,
        page: PageId,
        name: &str,
        args: Value,
    ) -> Result<Value, BridgeError> {
        let Some(session) = self.sessions.get(&page).map(|s| s.value().clone()) else {
            return Err(BridgeError::Connection);
        };

        let id = CallId::new();
        let (resolver, outcome_rx) = oneshot::channel();
        let channel = {
            let mut guard = session.lock();
            let Some((_, channel)) = &guard.channel else {
                return Err(BridgeError::Connection);
            };
            let channel = channel.clone();
            guard.pending.insert(
                id,
                PendingCall {
                    page,
                    resolver,
                    issued_at: Instant::now(),
                },
            );
            channel
        };

        if let Err(err) = channel.send(Envelope::call_request(id, name, args)).await {
            session.lock().pending.remove(&id);
            warn!(target: "session-registry", %page, %id, %err, "tool call send failed");
            return Err(BridgeError::Connection);
        }

        match tokio::time::timeout(self.config.call_timeout(), outcome_rx).await {
            Ok(Ok(outcome)) => outcome,
            // The pending entry was dropped without a resolution. Every
            // removal path resolves first, so treat this as cancellation.
            Ok(Err(_)) => Err(BridgeError::cancelled("pending call dropped")),
            Err(_) => {
                // Purge so a late response is silently discarded.
                session.lock().pending.remove(&id);
                debug!(target: "session-registry", %page, %id, "tool call deadline expired");
                Err(BridgeError::Timeout)
            }
        }
    }

    /// Entry point for all inbound traffic from a page's channel.
    pub fn handle_message(&self, page: PageId, envelope: Envelope) {
        match envelope.classify() {
            Message::Response { id, outcome } => {
                let resolved = self
                    .sessions
                    .get(&page)
                    .map(|s| s.value().clone())
                    .and_then(|session| session.lock().pending.remove(&id));
                match resolved {
                    Some(call) => {
                        debug!(
                            target: "session-registry",
                            %page, %id,
                            elapsed_ms = call.issued_at.elapsed().as_millis() as u64,
                            "tool call resolved"
                        );
                        call.resolve(
                            outcome.map_err(|payload| BridgeError::Execution(payload.message)),
                        );
                    }
                    None => {
                        debug!(target: "session-registry", %page, %id, "late response discarded");
                    }
                }
            }
            Message::Notification { method, params } if method == METHOD_TOOLS_LIST_CHANGED => {
                match serde_json::from_value::<CapabilitySnapshot>(params) {
                    Ok(snapshot) => self.store_snapshot(page, snapshot),
                    Err(err) => {
                        warn!(target: "session-registry", %page, %err, "malformed capability snapshot");
                    }
                }
            }
            Message::Notification { method, .. } => {
                debug!(target: "session-registry", %page, %method, "unhandled notification");
            }
            Message::Request { method, .. } => {
                debug!(target: "session-registry", %page, %method, "unexpected request from page");
            }
            Message::Ignored => {}
        }
    }

    fn store_snapshot(&self, page: PageId, snapshot: CapabilitySnapshot) {
        // Never create a session here: a notification arriving after
        // teardown must not resurrect state for a removed page.
        let Some(session) = self.sessions.get(&page).map(|s| s.value().clone()) else {
            debug!(target: "session-registry", %page, "snapshot for unknown page discarded");
            return;
        };
        {
            let mut guard = session.lock();
            debug!(
                target: "session-registry",
                page = %guard.page,
                tools = snapshot.tools.len(),
                requested = snapshot.requested,
                "capability snapshot replaced"
            );
            guard.snapshot = Some(snapshot.clone());
        }
        let _ = self.snapshots.send((page, snapshot));
    }

    /// Cached capability snapshot, if any. Replaced wholesale on each change
    /// notification.
    pub fn snapshot(&self, page: PageId) -> Option<CapabilitySnapshot> {
        self.sessions
            .get(&page)
            .and_then(|session| session.value().lock().snapshot.clone())
    }

    pub fn has_channel(&self, page: PageId) -> bool {
        self.sessions
            .get(&page)
            .map(|session| session.value().lock().channel.is_some())
            .unwrap_or(false)
    }

    /// Cancel every pending call for the page, synchronously with respect to
    /// the trigger (navigation start or teardown).
    pub fn cancel_pending(&self, page: PageId, reason: &str) {
        let Some(session) = self.sessions.get(&page).map(|s| s.value().clone()) else {
            return;
        };
        let orphaned = session.lock().drain_pending();
        for (id, call) in orphaned {
            debug!(target: "session-registry", page = %call.page, %id, reason, "cancelling pending call");
            call.resolve(Err(BridgeError::cancelled(reason)));
        }
    }

    /// Page-instance teardown: cancel pending calls and delete all state.
    pub fn remove_session(&self, page: PageId) {
        let Some((_, session)) = self.sessions.remove(&page) else {
            return;
        };
        let orphaned = session.lock().drain_pending();
        for (id, call) in orphaned {
            debug!(target: "session-registry", %page, %id, "cancelling pending call on teardown");
            call.resolve(Err(BridgeError::cancelled("page removed")));
        }
        info!(target: "session-registry", %page, "session removed");
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
