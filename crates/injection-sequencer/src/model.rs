use std::path::PathBuf;

use async_trait::async_trait;

use pagebridge_core_types::{BridgeError, PageId};

/// Where injected code runs. The intermediary context relays between the
/// coordinator channel and the page; the page context is the page's own
/// world, where tools register.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExecutionContext {
    Intermediary,
    Page,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Timing {
    Immediate,
    OnIdle,
}

#[derive(Clone, Debug)]
pub enum InjectionPayload {
    File(PathBuf),
    Source(String),
}

impl InjectionPayload {
    /// Short label for logs.
    pub fn label(&self) -> String {
        match self {
            Self::File(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Self::Source(_) => "<inline>".to_string(),
        }
    }
}

/// Host injection interface. Injection is asynchronous on the host side; a
/// returned error means the payload never ran.
#[async_trait]
pub trait Injector: Send + Sync {
    async fn inject(
        &self,
        page: PageId,
        context: ExecutionContext,
        timing: Timing,
        payload: InjectionPayload,
    ) -> Result<(), BridgeError>;
}
