use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use pagebridge_core_types::BridgeError;
use pagebridge_protocol::ToolSummary;

/// Executes a tool with already-validated arguments. Executors may suspend.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, args: Value) -> Result<Value, BridgeError>;
}

/// Adapter turning an async closure into an executor.
pub struct FnExecutor<F>(pub F);

#[async_trait]
impl<F, Fut> ToolExecutor for FnExecutor<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, BridgeError>> + Send,
{
    async fn execute(&self, args: Value) -> Result<Value, BridgeError> {
        (self.0)(args).await
    }
}

/// Registration input as supplied by a page author.
#[derive(Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// Defaults to an unconstrained object schema when omitted.
    pub input_schema: Option<Value>,
    pub executor: Arc<dyn ToolExecutor>,
}

impl ToolSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Option<Value>,
        executor: Arc<dyn ToolExecutor>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            executor,
        }
    }
}

/// Stored tool record. Never serialised; only its [`ToolSummary`] leaves the
/// registry.
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub executor: Arc<dyn ToolExecutor>,
}

impl ToolDescriptor {
    pub fn summary(&self) -> ToolSummary {
        ToolSummary {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish_non_exhaustive()
    }
}
