use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, error, info, warn};
use url::Url;

use pagebridge_core_types::{BridgeError, FrameId, PageId};
use pagebridge_session_registry::SessionRegistry;
use pagebridge_script_meta::{url_admitted, SourceKind};

use crate::config::SequencerConfig;
use crate::model::{ExecutionContext, InjectionPayload, Injector, Timing};
use crate::store::{ToolSource, ToolSourceStore};

/// Pending-bootstrap marker. Overwritten by a second rapid navigation so
/// exactly one bootstrap occurs, keyed to the later navigation.
#[derive(Clone, Debug)]
struct PendingNavigation {
    url: String,
}

/// Navigation-driven bootstrap state machine.
pub struct InjectionSequencer {
    pending: DashMap<PageId, PendingNavigation>,
    sessions: Arc<SessionRegistry>,
    injector: Arc<dyn Injector>,
    store: Arc<ToolSourceStore>,
    config: SequencerConfig,
}

impl InjectionSequencer {
    pub fn new(
        sessions: Arc<SessionRegistry>,
        injector: Arc<dyn Injector>,
        store: Arc<ToolSourceStore>,
        config: SequencerConfig,
    ) -> Self {
        Self {
            pending: DashMap::new(),
            sessions,
            injector,
            store,
            config,
        }
    }

    /// Top-level navigation started: cancel in-flight calls now (awaiters
    /// observe the cancellation immediately) and arm the bootstrap marker.
    pub fn on_navigation_start(&self, page: PageId, frame: FrameId, url: &str) {
        if !frame.is_top() {
            return;
        }
        self.sessions.cancel_pending(page, "navigation");
        let replaced = self
            .pending
            .insert(page, PendingNavigation { url: url.to_string() })
            .is_some();
        if replaced {
            debug!(target: "injection-sequencer", %page, url, "bootstrap marker overwritten by newer navigation");
        }
    }

    /// Page reached readiness. No-ops when the marker was already consumed
    /// (rapid back-to-back navigations produce one bootstrap, not two). The
    /// bootstrap stays keyed to the armed navigation's URL; the host-reported
    /// one is logged when it disagrees.
    pub async fn on_ready(
        &self,
        page: PageId,
        frame: FrameId,
        url: &str,
    ) -> Result<(), BridgeError> {
        if !frame.is_top() {
            return Ok(());
        }
        let Some((_, nav)) = self.pending.remove(&page) else {
            debug!(target: "injection-sequencer", %page, url, "readiness without pending bootstrap, ignoring");
            return Ok(());
        };
        if nav.url != url {
            debug!(target: "injection-sequencer", %page, reported = url, armed = %nav.url, "readiness url differs from armed navigation");
        }
        self.bootstrap(page, &nav.url).await
    }

    /// Page instance torn down: drop the marker and all session state.
    pub fn on_page_removed(&self, page: PageId) {
        self.pending.remove(&page);
        self.sessions.remove_session(page);
    }

    /// True while a bootstrap marker is armed for the page.
    pub fn is_navigation_pending(&self, page: PageId) -> bool {
        self.pending.contains_key(&page)
    }

    /// Run the ordered bootstrap. Steps 1, 2 and 4 are fail-fast: a failure
    /// aborts the remaining core steps so no partially-initialised state is
    /// left running. Steps 3 and 5 are fail-isolated per tool.
    pub async fn bootstrap(&self, page: PageId, url: &str) -> Result<(), BridgeError> {
        if !is_injectable(url) {
            debug!(target: "injection-sequencer", %page, url, "non-http(s) target, bootstrap skipped");
            return Ok(());
        }
        info!(target: "injection-sequencer", %page, url, "bootstrap started");

        // 1. relay shim: must be listening before anything announces
        self.inject_core(
            page,
            ExecutionContext::Intermediary,
            InjectionPayload::File(self.config.relay_shim.clone()),
        )
        .await?;

        // 2. capability polyfill: must exist before any tool registers
        self.inject_core(
            page,
            ExecutionContext::Page,
            InjectionPayload::File(self.config.polyfill.clone()),
        )
        .await?;

        // 3. pre-built tools admitted by the URL
        self.inject_tools(page, url, SourceKind::Builtin).await;

        // 4. announcer: reads the live registry and emits the first snapshot
        self.inject_core(
            page,
            ExecutionContext::Page,
            InjectionPayload::File(self.config.announcer.clone()),
        )
        .await?;

        // 5. externally authored tools admitted by the URL
        self.inject_tools(page, url, SourceKind::External).await;

        info!(target: "injection-sequencer", %page, "bootstrap finished");
        Ok(())
    }

    async fn inject_core(
        &self,
        page: PageId,
        context: ExecutionContext,
        payload: InjectionPayload,
    ) -> Result<(), BridgeError> {
        let label = payload.label();
        if let Err(err) = self
            .injector
            .inject(page, context, Timing::Immediate, payload)
            .await
        {
            error!(target: "injection-sequencer", %page, %label, %err, "core bootstrap step failed, aborting");
            return Err(err);
        }
        Ok(())
    }

    async fn inject_tools(&self, page: PageId, url: &str, kind: SourceKind) {
        for source in self.store.of_kind(kind) {
            if !source.enabled() {
                debug!(target: "injection-sequencer", %page, id = %source.id, "tool disabled, skipping");
                continue;
            }
            let metadata = match source.metadata() {
                Ok(metadata) => metadata,
                Err(err) => {
                    // one malformed source must not block the others
                    warn!(target: "injection-sequencer", %page, id = %source.id, %err, "tool source rejected");
                    continue;
                }
            };
            if !url_admitted(url, &metadata.match_patterns, &metadata.exclude_patterns) {
                continue;
            }
            if let Err(err) = self
                .injector
                .inject(
                    page,
                    ExecutionContext::Page,
                    Timing::Immediate,
                    InjectionPayload::Source(source.code.clone()),
                )
                .await
            {
                warn!(target: "injection-sequencer", %page, id = %source.id, %err, "tool injection failed, continuing");
            }
        }
    }
}

fn is_injectable(url: &str) -> bool {
    Url::parse(url)
        .map(|parsed| matches!(parsed.scheme(), "http" | "https"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::sync::mpsc;

    use pagebridge_protocol::Envelope;
    use pagebridge_session_registry::{Channel, SessionConfig};

    struct RecordingInjector {
        log: Mutex<Vec<(ExecutionContext, String)>>,
        fail_label: Mutex<Option<String>>,
    }

    impl RecordingInjector {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                log: Mutex::new(Vec::new()),
                fail_label: Mutex::new(None),
            })
        }

        fn labels(&self) -> Vec<String> {
            self.log.lock().iter().map(|(_, l)| l.clone()).collect()
        }
    }

    #[async_trait::async_trait]
    impl Injector for RecordingInjector {
        async fn inject(
            &self,
            _page: PageId,
            context: ExecutionContext,
            _timing: Timing,
            payload: InjectionPayload,
        ) -> Result<(), BridgeError> {
            let label = match &payload {
                InjectionPayload::File(_) => payload.label(),
                InjectionPayload::Source(code) => {
                    // identify tool payloads by their metadata name
                    code.split("name: '")
                        .nth(1)
                        .and_then(|rest| rest.split('\'').next())
                        .unwrap_or("<inline>")
                        .to_string()
                }
            };
            if self.fail_label.lock().as_deref() == Some(label.as_str()) {
                return Err(BridgeError::injection(format!("{label} refused")));
            }
            self.log.lock().push((context, label));
            Ok(())
        }
    }

    fn tool_source(name: &str, pattern: &str) -> String {
        format!(
            r#""use tool v1";
            export const metadata = {{
                name: '{name}',
                namespace: 'shop',
                version: '1.0.0',
                match: '{pattern}',
            }};
            export async function execute(args) {{ return null; }}
            "#
        )
    }

    fn build(
        injector: Arc<RecordingInjector>,
        store: Arc<ToolSourceStore>,
    ) -> (InjectionSequencer, Arc<SessionRegistry>) {
        let (sessions, _boot) = SessionRegistry::new(SessionConfig::default());
        let sequencer = InjectionSequencer::new(
            sessions.clone(),
            injector,
            store,
            SequencerConfig::default(),
        );
        (sequencer, sessions)
    }

    #[tokio::test]
    async fn bootstrap_runs_in_strict_order() {
        let injector = RecordingInjector::new();
        let store = Arc::new(ToolSourceStore::new());
        store.add(ToolSource::new(
            "builtin",
            SourceKind::Builtin,
            tool_source("builtin_tool", "<all_urls>"),
        ));
        store.add(ToolSource::new(
            "external",
            SourceKind::External,
            tool_source("external_tool", "<all_urls>"),
        ));
        let (sequencer, _) = build(injector.clone(), store);

        let page = PageId(1);
        sequencer.on_navigation_start(page, FrameId::TOP, "https://example.com/");
        sequencer
            .on_ready(page, FrameId::TOP, "https://example.com/")
            .await
            .unwrap();

        assert_eq!(
            injector.labels(),
            vec![
                "relay.js",
                "polyfill.js",
                "builtin_tool",
                "announcer.js",
                "external_tool",
            ]
        );
        let contexts: Vec<_> = injector.log.lock().iter().map(|(c, _)| *c).collect();
        assert_eq!(contexts[0], ExecutionContext::Intermediary);
        assert!(contexts[1..].iter().all(|c| *c == ExecutionContext::Page));
    }

    #[tokio::test]
    async fn two_navigations_produce_exactly_one_bootstrap() {
        let injector = RecordingInjector::new();
        let (sequencer, _) = build(injector.clone(), Arc::new(ToolSourceStore::new()));

        let page = PageId(2);
        sequencer.on_navigation_start(page, FrameId::TOP, "https://first.example/");
        sequencer.on_navigation_start(page, FrameId::TOP, "https://second.example/");
        sequencer
            .on_ready(page, FrameId::TOP, "https://second.example/")
            .await
            .unwrap();
        // a second readiness callback finds the marker cleared
        sequencer
            .on_ready(page, FrameId::TOP, "https://second.example/")
            .await
            .unwrap();

        let relays = injector
            .labels()
            .iter()
            .filter(|l| *l == "relay.js")
            .count();
        assert_eq!(relays, 1);
    }

    #[tokio::test]
    async fn bootstrap_stays_keyed_to_the_armed_navigation_url() {
        let injector = RecordingInjector::new();
        let store = Arc::new(ToolSourceStore::new());
        store.add(ToolSource::new(
            "second_only",
            SourceKind::Builtin,
            tool_source("second_only_tool", "*://second.example/*"),
        ));
        let (sequencer, _) = build(injector.clone(), store);

        let page = PageId(12);
        sequencer.on_navigation_start(page, FrameId::TOP, "https://first.example/");
        sequencer.on_navigation_start(page, FrameId::TOP, "https://second.example/");
        // readiness reports the earlier navigation's url; the armed one wins
        sequencer
            .on_ready(page, FrameId::TOP, "https://first.example/")
            .await
            .unwrap();

        assert!(injector
            .labels()
            .contains(&"second_only_tool".to_string()));
    }

    #[tokio::test]
    async fn subframe_navigation_is_ignored() {
        let injector = RecordingInjector::new();
        let (sequencer, _) = build(injector.clone(), Arc::new(ToolSourceStore::new()));

        let page = PageId(3);
        sequencer.on_navigation_start(page, FrameId(42), "https://example.com/");
        assert!(!sequencer.is_navigation_pending(page));
        sequencer
            .on_ready(page, FrameId::TOP, "https://example.com/")
            .await
            .unwrap();
        assert!(injector.labels().is_empty());
    }

    #[tokio::test]
    async fn relay_failure_aborts_everything_else() {
        let injector = RecordingInjector::new();
        *injector.fail_label.lock() = Some("relay.js".to_string());
        let store = Arc::new(ToolSourceStore::new());
        store.add(ToolSource::new(
            "builtin",
            SourceKind::Builtin,
            tool_source("builtin_tool", "<all_urls>"),
        ));
        let (sequencer, _) = build(injector.clone(), store);

        let err = sequencer
            .bootstrap(PageId(4), "https://example.com/")
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Injection(_)));
        assert!(injector.labels().is_empty());
    }

    #[tokio::test]
    async fn announcer_failure_aborts_external_tools() {
        let injector = RecordingInjector::new();
        *injector.fail_label.lock() = Some("announcer.js".to_string());
        let store = Arc::new(ToolSourceStore::new());
        store.add(ToolSource::new(
            "external",
            SourceKind::External,
            tool_source("external_tool", "<all_urls>"),
        ));
        let (sequencer, _) = build(injector.clone(), store);

        let err = sequencer
            .bootstrap(PageId(5), "https://example.com/")
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Injection(_)));
        assert_eq!(injector.labels(), vec!["relay.js", "polyfill.js"]);
    }

    #[tokio::test]
    async fn one_failing_tool_does_not_block_the_rest() {
        let injector = RecordingInjector::new();
        *injector.fail_label.lock() = Some("flaky_tool".to_string());
        let store = Arc::new(ToolSourceStore::new());
        store.add(ToolSource::new(
            "flaky",
            SourceKind::Builtin,
            tool_source("flaky_tool", "<all_urls>"),
        ));
        store.add(ToolSource::new(
            "solid",
            SourceKind::Builtin,
            tool_source("solid_tool", "<all_urls>"),
        ));
        let (sequencer, _) = build(injector.clone(), store);

        sequencer
            .bootstrap(PageId(6), "https://example.com/")
            .await
            .unwrap();
        assert_eq!(
            injector.labels(),
            vec!["relay.js", "polyfill.js", "solid_tool", "announcer.js"]
        );
    }

    #[tokio::test]
    async fn malformed_source_is_isolated() {
        let injector = RecordingInjector::new();
        let store = Arc::new(ToolSourceStore::new());
        store.add(ToolSource::new("junk", SourceKind::Builtin, "not a tool"));
        store.add(ToolSource::new(
            "good",
            SourceKind::Builtin,
            tool_source("good_tool", "<all_urls>"),
        ));
        let (sequencer, _) = build(injector.clone(), store);

        sequencer
            .bootstrap(PageId(7), "https://example.com/")
            .await
            .unwrap();
        assert!(injector.labels().contains(&"good_tool".to_string()));
    }

    #[tokio::test]
    async fn url_and_enabled_filters_apply() {
        let injector = RecordingInjector::new();
        let store = Arc::new(ToolSourceStore::new());
        store.add(ToolSource::new(
            "elsewhere",
            SourceKind::Builtin,
            tool_source("elsewhere_tool", "*://other.example/*"),
        ));
        store.add(ToolSource::new(
            "disabled",
            SourceKind::Builtin,
            tool_source("disabled_tool", "<all_urls>"),
        ));
        store.set_enabled("disabled", false);
        let (sequencer, _) = build(injector.clone(), store);

        sequencer
            .bootstrap(PageId(8), "https://example.com/")
            .await
            .unwrap();
        assert_eq!(
            injector.labels(),
            vec!["relay.js", "polyfill.js", "announcer.js"]
        );
    }

    #[tokio::test]
    async fn non_http_targets_are_skipped_silently() {
        let injector = RecordingInjector::new();
        let (sequencer, _) = build(injector.clone(), Arc::new(ToolSourceStore::new()));

        sequencer
            .bootstrap(PageId(9), "chrome://settings/")
            .await
            .unwrap();
        sequencer.bootstrap(PageId(9), "about:blank").await.unwrap();
        assert!(injector.labels().is_empty());
    }

    #[tokio::test]
    async fn navigation_start_cancels_pending_calls_synchronously() {
        struct SilentChannel;
        #[async_trait::async_trait]
        impl Channel for SilentChannel {
            async fn send(&self, _envelope: Envelope) -> Result<(), BridgeError> {
                Ok(())
            }
        }

        let injector = RecordingInjector::new();
        let (sequencer, sessions) = build(injector, Arc::new(ToolSourceStore::new()));
        let page = PageId(10);
        sessions.connect(page, Arc::new(SilentChannel)).await;

        let sessions_for_call = sessions.clone();
        let call = tokio::spawn(async move {
            sessions_for_call.call_tool(page, "anything", json!({})).await
        });
        // let the call register its pending entry
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        sequencer.on_navigation_start(page, FrameId::TOP, "https://example.com/next");
        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, BridgeError::Cancelled(_)));
    }

    #[tokio::test]
    async fn page_removed_drops_marker_and_session() {
        let injector = RecordingInjector::new();
        let (sequencer, sessions) = build(injector.clone(), Arc::new(ToolSourceStore::new()));
        let page = PageId(11);

        sequencer.on_navigation_start(page, FrameId::TOP, "https://example.com/");
        sequencer.on_page_removed(page);
        assert!(!sequencer.is_navigation_pending(page));
        assert_eq!(sessions.session_count(), 0);
        sequencer
            .on_ready(page, FrameId::TOP, "https://example.com/")
            .await
            .unwrap();
        assert!(injector.labels().is_empty());
    }

    #[test]
    fn injectable_schemes() {
        assert!(is_injectable("https://example.com/x"));
        assert!(is_injectable("http://example.com"));
        assert!(!is_injectable("file:///etc/passwd"));
        assert!(!is_injectable("not a url"));
    }
}
