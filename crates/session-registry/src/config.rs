use std::time::Duration;

use serde::Deserialize;

/// Tunables for the session registry.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Fixed per-call deadline in milliseconds.
    pub call_timeout_ms: u64,
    /// Bound on the not-yet-sendable queue per disconnected page. The
    /// oldest entry is dropped (and logged) when the bound is hit.
    pub queue_bound: usize,
}

impl SessionConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 10_000,
            queue_bound: 64,
        }
    }
}
