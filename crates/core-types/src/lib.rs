//! Shared identifiers and the error taxonomy for the pagebridge workspace.
//!
//! Every crate in the workspace converges on [`BridgeError`] at its public
//! boundary so callers see one error surface regardless of which subsystem
//! detected the failure.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Identifier of a page instance. Assigned by the host (a tab id), not
/// generated here, so it is a plain wrapper without a constructor.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PageId(pub i64);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a frame within a page. Only the top-level frame drives the
/// bootstrap lifecycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct FrameId(pub i64);

impl FrameId {
    pub const TOP: FrameId = FrameId(0);

    pub fn is_top(self) -> bool {
        self.0 == 0
    }
}

/// Identifier of a single tool invocation, generated fresh per call.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct CallId(pub Uuid);

impl CallId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Epoch of a connected channel. A page may see many channels over its
/// lifetime but only the one carrying the latest epoch is live; stale
/// disconnect callbacks compare against this.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub u64);

/// A single path-qualified schema violation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SchemaIssue {
    pub path: String,
    pub message: String,
}

impl SchemaIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

fn render_issues(issues: &[SchemaIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Error taxonomy shared across the workspace.
///
/// Connection, cancellation and timeout failures are raised at the session
/// registry boundary; validation, not-found and execution failures at the
/// capability registry boundary; parsing failures at bootstrap time.
#[derive(Clone, Debug, Error, Serialize, Deserialize)]
pub enum BridgeError {
    #[error("no active channel for page")]
    Connection,
    #[error("call cancelled: {0}")]
    Cancelled(String),
    #[error("call timed out")]
    Timeout,
    #[error("argument validation failed: {}", render_issues(.0))]
    Validation(Vec<SchemaIssue>),
    #[error("unknown tool: {0}")]
    NotFound(String),
    #[error("tool execution failed: {0}")]
    Execution(String),
    #[error("tool source rejected: {0}")]
    Parsing(String),
    #[error("injection failed: {0}")]
    Injection(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled(reason.into())
    }

    pub fn execution(cause: impl fmt::Display) -> Self {
        Self::Execution(cause.to_string())
    }

    pub fn parsing(detail: impl Into<String>) -> Self {
        Self::Parsing(detail.into())
    }

    pub fn injection(detail: impl Into<String>) -> Self {
        Self::Injection(detail.into())
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal(detail.into())
    }

    /// True when retrying the same call on a fresh channel could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection | Self::Cancelled(_) | Self::Timeout)
    }
}
