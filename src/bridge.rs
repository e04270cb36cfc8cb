//! Top-level wiring for the coordinator side.
//!
//! Construction is explicit: the host hands over an [`Injector`] and a
//! [`BridgeConfig`], and the bridge assembles the session registry, the tool
//! source store and the injection sequencer around them. There is no global
//! state; a host embedding two bridges gets two fully independent stacks.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

use pagebridge_injection_sequencer::{InjectionSequencer, Injector, ToolSource, ToolSourceStore};
use pagebridge_core_types::{BridgeError, ChannelId, FrameId, PageId};
use pagebridge_protocol::{CapabilitySnapshot, Envelope};
use pagebridge_session_registry::{Channel, SessionRegistry};
use pagebridge_script_meta::SourceKind;

use crate::config::BridgeConfig;

/// One coordinator-side bridge instance.
pub struct Bridge {
    sessions: Arc<SessionRegistry>,
    sequencer: Arc<InjectionSequencer>,
    store: Arc<ToolSourceStore>,
    bootstrap_rx: parking_lot::Mutex<Option<mpsc::UnboundedReceiver<PageId>>>,
}

impl Bridge {
    pub fn new(config: BridgeConfig, injector: Arc<dyn Injector>) -> Self {
        let (sessions, bootstrap_rx) = SessionRegistry::new(config.session);
        let store = Arc::new(ToolSourceStore::new());
        let sequencer = Arc::new(InjectionSequencer::new(
            sessions.clone(),
            injector,
            store.clone(),
            config.sequencer,
        ));
        Self {
            sessions,
            sequencer,
            store,
            bootstrap_rx: parking_lot::Mutex::new(Some(bootstrap_rx)),
        }
    }

    pub fn sessions(&self) -> Arc<SessionRegistry> {
        self.sessions.clone()
    }

    pub fn sequencer(&self) -> Arc<InjectionSequencer> {
        self.sequencer.clone()
    }

    /// Stream of pages that queued a message while disconnected and want a
    /// bootstrap. Takeable once; the host drives it.
    pub fn take_bootstrap_requests(&self) -> Option<mpsc::UnboundedReceiver<PageId>> {
        self.bootstrap_rx.lock().take()
    }

    // channel lifecycle

    pub async fn connect(&self, page: PageId, channel: Arc<dyn Channel>) -> ChannelId {
        self.sessions.connect(page, channel).await
    }

    pub fn disconnect(&self, page: PageId, epoch: ChannelId) {
        self.sessions.disconnect(page, epoch)
    }

    pub fn handle_message(&self, page: PageId, envelope: Envelope) {
        self.sessions.handle_message(page, envelope)
    }

    // coordinator-facing calls

    pub async fn call_tool(
        &self,
        page: PageId,
        name: &str,
        args: Value,
    ) -> Result<Value, BridgeError> {
        self.sessions.call_tool(page, name, args).await
    }

    pub async fn send(&self, page: PageId, envelope: Envelope) -> Result<(), BridgeError> {
        self.sessions.send(page, envelope).await
    }

    pub fn snapshot(&self, page: PageId) -> Option<CapabilitySnapshot> {
        self.sessions.snapshot(page)
    }

    pub fn subscribe_snapshots(&self) -> broadcast::Receiver<(PageId, CapabilitySnapshot)> {
        self.sessions.subscribe_snapshots()
    }

    // host navigation hooks

    pub fn on_navigation_start(&self, page: PageId, frame: FrameId, url: &str) {
        self.sequencer.on_navigation_start(page, frame, url)
    }

    pub async fn on_ready(
        &self,
        page: PageId,
        frame: FrameId,
        url: &str,
    ) -> Result<(), BridgeError> {
        self.sequencer.on_ready(page, frame, url).await
    }

    pub fn on_page_removed(&self, page: PageId) {
        self.sequencer.on_page_removed(page)
    }

    // tool source management

    pub fn add_source(
        &self,
        id: impl Into<String>,
        kind: SourceKind,
        code: impl Into<String>,
    ) -> Arc<ToolSource> {
        self.store.add(ToolSource::new(id, kind, code))
    }

    pub fn set_source_enabled(&self, id: &str, enabled: bool) -> bool {
        self.store.set_enabled(id, enabled)
    }

    pub fn source_count(&self) -> usize {
        self.store.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pagebridge_injection_sequencer::{ExecutionContext, InjectionPayload, Timing};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct NullInjector {
        count: Mutex<usize>,
    }

    #[async_trait]
    impl Injector for NullInjector {
        async fn inject(
            &self,
            _page: PageId,
            _context: ExecutionContext,
            _timing: Timing,
            _payload: InjectionPayload,
        ) -> Result<(), BridgeError> {
            *self.count.lock() += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn bootstrap_requests_are_takeable_once() {
        let bridge = Bridge::new(BridgeConfig::default(), Arc::new(NullInjector::default()));
        assert!(bridge.take_bootstrap_requests().is_some());
        assert!(bridge.take_bootstrap_requests().is_none());
    }

    #[tokio::test]
    async fn queued_send_emits_a_bootstrap_request() {
        let bridge = Bridge::new(BridgeConfig::default(), Arc::new(NullInjector::default()));
        let mut requests = bridge.take_bootstrap_requests().unwrap();
        let page = PageId(21);
        bridge
            .send(page, Envelope::list_request(pagebridge_core_types::CallId::new()))
            .await
            .unwrap();
        assert_eq!(requests.recv().await, Some(page));
    }

    #[tokio::test]
    async fn navigation_hooks_drive_the_sequencer() {
        let injector = Arc::new(NullInjector::default());
        let bridge = Bridge::new(BridgeConfig::default(), injector.clone());
        let page = PageId(22);

        bridge.on_navigation_start(page, FrameId::TOP, "https://shop.example/cart");
        bridge
            .on_ready(page, FrameId::TOP, "https://shop.example/cart")
            .await
            .unwrap();
        // relay shim, polyfill, announcer (no tool sources registered)
        assert_eq!(*injector.count.lock(), 3);

        // marker consumed: a second readiness is a no-op
        bridge
            .on_ready(page, FrameId::TOP, "https://shop.example/cart")
            .await
            .unwrap();
        assert_eq!(*injector.count.lock(), 3);
    }

    #[tokio::test]
    async fn disabled_sources_do_not_inject() {
        let injector = Arc::new(NullInjector::default());
        let bridge = Bridge::new(BridgeConfig::default(), injector.clone());
        bridge.add_source(
            "sample",
            SourceKind::Builtin,
            r#"
            "use tool v1";
            export const metadata = {
                name: 'sample_tool',
                namespace: 'shop',
                version: '1.0.0',
                match: '<all_urls>',
            };
            export async function execute(args) { return null; }
            "#,
        );
        assert!(bridge.set_source_enabled("sample", false));
        assert!(!bridge.set_source_enabled("missing", false));

        let page = PageId(23);
        bridge.on_navigation_start(page, FrameId::TOP, "https://shop.example");
        bridge
            .on_ready(page, FrameId::TOP, "https://shop.example")
            .await
            .unwrap();
        assert_eq!(*injector.count.lock(), 3);
    }
}
