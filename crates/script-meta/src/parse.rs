//! Tool-source parsing: version pragma, metadata literal, export checks.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use pagebridge_core_types::BridgeError;

use crate::literal::Cursor;
use crate::model::{ScriptMetadata, SourceKind};

/// The only accepted pragma. It must be the first statement of the source;
/// leading comments and whitespace are ignored.
pub const TOOL_PRAGMA: &str = "use tool v1";

/// Namespace reserved for sources shipped with the coordinator. Externally
/// authored sources may not claim it.
pub const RESERVED_NAMESPACE: &str = "bridge";

static SNAKE_CASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").unwrap());
static METADATA_EXPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"export\s+const\s+metadata\s*=").unwrap());
static EXECUTE_EXPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"export\s+((async\s+)?function\s+execute\b|const\s+execute\s*=)").unwrap()
});
static ASYNC_GATE_EXPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"export\s+(async\s+function\s+should_register\b|const\s+should_register\s*=\s*async\b)")
        .unwrap()
});
static GATE_EXPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"export\s+(function\s+should_register\b|const\s+should_register\s*=)").unwrap()
});

/// Parse and vet one tool source without executing it.
pub fn parse_source(source: &str, kind: SourceKind) -> Result<ScriptMetadata, BridgeError> {
    check_pragma(source)?;
    let metadata_value = extract_metadata_literal(source)?;
    let metadata = build_metadata(metadata_value, kind)?;
    check_exports(source)?;
    Ok(metadata)
}

fn check_pragma(source: &str) -> Result<(), BridgeError> {
    let mut cursor = Cursor::new(source);
    cursor.skip_trivia();
    match cursor.peek() {
        Some('"') | Some('\'') => {}
        _ => {
            return Err(BridgeError::parsing(
                "missing tool pragma: first statement must be a directive string",
            ))
        }
    }
    let directive = cursor
        .parse_string()
        .map_err(|err| BridgeError::parsing(format!("malformed tool pragma: {err}")))?;
    if directive != TOOL_PRAGMA {
        return Err(BridgeError::parsing(format!(
            "unsupported tool pragma `{directive}` (expected `{TOOL_PRAGMA}`)"
        )));
    }
    Ok(())
}

fn extract_metadata_literal(source: &str) -> Result<Value, BridgeError> {
    let found = METADATA_EXPORT
        .find(source)
        .ok_or_else(|| BridgeError::parsing("missing `export const metadata` declaration"))?;
    let rest = &source[found.end()..];
    let (value, _consumed) = crate::literal::parse_literal(rest)
        .map_err(|err| BridgeError::parsing(format!("invalid metadata literal: {err}")))?;
    Ok(value)
}

fn build_metadata(value: Value, kind: SourceKind) -> Result<ScriptMetadata, BridgeError> {
    let object = value
        .as_object()
        .ok_or_else(|| BridgeError::parsing("metadata must be an object literal"))?;

    let name = required_string(object, "name")?;
    let namespace = required_string(object, "namespace")?;
    let version = required_string(object, "version")?;

    for (field, text) in [("name", &name), ("namespace", &namespace)] {
        if !SNAKE_CASE.is_match(text) {
            return Err(BridgeError::parsing(format!(
                "metadata {field} `{text}` must be snake_case (^[a-z][a-z0-9_]*$)"
            )));
        }
    }

    if kind == SourceKind::External && namespace == RESERVED_NAMESPACE {
        return Err(BridgeError::parsing(format!(
            "namespace `{RESERVED_NAMESPACE}` is reserved for built-in tools"
        )));
    }

    let match_patterns = pattern_list(object.get("match"))?;
    if match_patterns.is_empty() {
        return Err(BridgeError::parsing("metadata field `match` is required"));
    }
    let exclude_patterns = match object.get("exclude") {
        Some(value) => pattern_list(Some(value))?,
        None => Vec::new(),
    };

    let description = object
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let schema = match object.get("schema") {
        None | Some(Value::Null) => None,
        Some(schema) if schema.is_object() => Some(schema.clone()),
        Some(_) => return Err(BridgeError::parsing("metadata field `schema` must be an object")),
    };

    Ok(ScriptMetadata {
        name,
        namespace,
        version,
        description,
        match_patterns,
        exclude_patterns,
        schema,
    })
}

fn required_string(
    object: &serde_json::Map<String, Value>,
    field: &str,
) -> Result<String, BridgeError> {
    object
        .get(field)
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .ok_or_else(|| BridgeError::parsing(format!("metadata field `{field}` is required")))
}

/// A single pattern string normalises to a one-element list.
fn pattern_list(value: Option<&Value>) -> Result<Vec<String>, BridgeError> {
    match value {
        None => Ok(Vec::new()),
        Some(Value::String(single)) => Ok(vec![single.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    BridgeError::parsing("pattern lists may only contain strings")
                })
            })
            .collect(),
        Some(_) => Err(BridgeError::parsing(
            "patterns must be a string or an array of strings",
        )),
    }
}

fn check_exports(source: &str) -> Result<(), BridgeError> {
    if !EXECUTE_EXPORT.is_match(source) {
        return Err(BridgeError::parsing("missing exported `execute` function"));
    }
    // The registration gate runs before any registration decision and must
    // not suspend; an async export is rejected outright.
    if ASYNC_GATE_EXPORT.is_match(source) {
        return Err(BridgeError::parsing(
            "`should_register` must be synchronous",
        ));
    }
    Ok(())
}

/// True when the source exports a registration gate at all.
pub fn has_registration_gate(source: &str) -> bool {
    GATE_EXPORT.is_match(source) && !ASYNC_GATE_EXPORT.is_match(source)
}
