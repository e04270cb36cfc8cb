use thiserror::Error;

use pagebridge_core_types::BridgeError;

/// Registration-time failures. Invocation-time failures use the shared
/// taxonomy directly (`Validation`, `NotFound`, `Execution`).
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool name must be non-empty")]
    EmptyName,
    #[error("tool description must be non-empty for `{0}`")]
    EmptyDescription(String),
    #[error("duplicate tool name `{0}` in batch")]
    DuplicateName(String),
}

impl From<RegistryError> for BridgeError {
    fn from(value: RegistryError) -> Self {
        BridgeError::internal(value.to_string())
    }
}
