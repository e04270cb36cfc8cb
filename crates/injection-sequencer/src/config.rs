use std::path::PathBuf;

use serde::Deserialize;

/// File references for the core bootstrap payloads.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    pub relay_shim: PathBuf,
    pub polyfill: PathBuf,
    pub announcer: PathBuf,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            relay_shim: PathBuf::from("assets/relay.js"),
            polyfill: PathBuf::from("assets/polyfill.js"),
            announcer: PathBuf::from("assets/announcer.js"),
        }
    }
}
