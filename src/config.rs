//! Bridge configuration: one serde-deserialisable struct per subsystem,
//! with defaults that match the reference behaviour.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use pagebridge_injection_sequencer::SequencerConfig;
use pagebridge_session_registry::SessionConfig;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub session: SessionConfig,
    pub sequencer: SequencerConfig,
}

impl BridgeConfig {
    /// Load from a JSON file; missing fields fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))
    }
}
