use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::debug;

use pagebridge_core_types::BridgeError;
use pagebridge_script_meta::{parse_source, ScriptMetadata, SourceKind};

/// One tool source plus its lazily-parsed metadata. The source is parsed at
/// most once; the result (including a parse failure) is cached.
pub struct ToolSource {
    pub id: String,
    pub kind: SourceKind,
    pub code: String,
    enabled: AtomicBool,
    parsed: OnceCell<Result<ScriptMetadata, BridgeError>>,
}

impl ToolSource {
    pub fn new(id: impl Into<String>, kind: SourceKind, code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            code: code.into(),
            enabled: AtomicBool::new(true),
            parsed: OnceCell::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Parse once, cache forever.
    pub fn metadata(&self) -> &Result<ScriptMetadata, BridgeError> {
        self.parsed
            .get_or_init(|| parse_source(&self.code, self.kind))
    }
}

/// Store of pre-built and externally authored tool sources, read by the
/// sequencer at bootstrap time.
#[derive(Default)]
pub struct ToolSourceStore {
    sources: RwLock<Vec<Arc<ToolSource>>>,
}

impl ToolSourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, source: ToolSource) -> Arc<ToolSource> {
        let source = Arc::new(source);
        self.sources.write().push(source.clone());
        debug!(target: "injection-sequencer", id = %source.id, "tool source added");
        source
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) -> bool {
        let sources = self.sources.read();
        match sources.iter().find(|source| source.id == id) {
            Some(source) => {
                source.set_enabled(enabled);
                true
            }
            None => false,
        }
    }

    /// All sources of the given provenance, in registration order.
    pub fn of_kind(&self, kind: SourceKind) -> Vec<Arc<ToolSource>> {
        self.sources
            .read()
            .iter()
            .filter(|source| source.kind == kind)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.read().is_empty()
    }
}
