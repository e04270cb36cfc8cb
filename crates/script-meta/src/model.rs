use serde_json::Value;

/// Provenance of a tool source. Built-in sources ship with the coordinator;
/// external sources are authored by third parties and face stricter
/// namespace rules.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SourceKind {
    Builtin,
    External,
}

/// Parsed descriptor embedded in a tool source. Parsed once per source.
#[derive(Clone, Debug, PartialEq)]
pub struct ScriptMetadata {
    pub name: String,
    pub namespace: String,
    pub version: String,
    pub description: String,
    pub match_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub schema: Option<Value>,
}

impl ScriptMetadata {
    /// Qualified tool name as announced to the coordinator.
    pub fn qualified_name(&self) -> String {
        format!("{}_{}", self.namespace, self.name)
    }
}
