//! Page-side capability registry: the sole owner of the tool map.
//!
//! Tools are registered by page authors, validated here at invocation time
//! and announced to the coordinator as plain summaries; the executor never
//! crosses the boundary.

pub mod errors;
pub mod model;
pub mod registry;

pub use errors::RegistryError;
pub use model::{FnExecutor, ToolDescriptor, ToolExecutor, ToolSpec};
pub use registry::CapabilityRegistry;
