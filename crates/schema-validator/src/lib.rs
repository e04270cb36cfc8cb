//! Recursive structural validator over a practical JSON-Schema subset.
//!
//! Supported keywords: `type` (string/number/integer/boolean/object/array/
//! null), `required`, `properties`, `additionalProperties: false`, `items`,
//! `minItems`/`maxItems`, `enum` and a couple of string `format` checks.
//! Nothing is compiled or code-generated; schemas are walked as plain
//! `serde_json::Value` trees.
//!
//! Error collection does not short-circuit across sibling branches: a type
//! failure on one property never hides problems on its siblings, but it does
//! suppress deeper checks inside the failing subtree. Nested calls return
//! their issue list to the caller; only [`check`] converts a non-empty list
//! into a [`BridgeError::Validation`].

mod format;

use serde_json::Value;

use pagebridge_core_types::{BridgeError, SchemaIssue};

/// Validate `value` against `schema`, collecting every applicable issue.
pub fn validate(schema: &Value, value: &Value) -> Vec<SchemaIssue> {
    let mut issues = Vec::new();
    validate_at(schema, value, "", &mut issues);
    issues
}

/// Top-level entry point: empty issue list maps to `Ok(())`, anything else
/// becomes a single structured error carrying the full list.
pub fn check(schema: &Value, value: &Value) -> Result<(), BridgeError> {
    let issues = validate(schema, value);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(BridgeError::Validation(issues))
    }
}

/// The default schema used when a tool declares no argument shape: any
/// object is accepted.
pub fn unconstrained_object() -> Value {
    serde_json::json!({ "type": "object" })
}

fn validate_at(schema: &Value, value: &Value, path: &str, issues: &mut Vec<SchemaIssue>) {
    let schema = match schema.as_object() {
        Some(map) => map,
        // A non-object schema constrains nothing.
        None => return,
    };

    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        if !type_matches(expected, value) {
            issues.push(SchemaIssue::new(
                path,
                format!("expected {}, got {}", expected, type_name(value)),
            ));
            // The subtree already failed its shape check; deeper keywords
            // would only produce noise.
            return;
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.iter().any(|candidate| candidate == value) {
            issues.push(SchemaIssue::new(
                path,
                format!("value not in enum: {}", render_enum(allowed)),
            ));
        }
    }

    if let Some(object) = value.as_object() {
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for field in required.iter().filter_map(Value::as_str) {
                if !object.contains_key(field) {
                    issues.push(SchemaIssue::new(
                        join_key(path, field),
                        "required field missing",
                    ));
                }
            }
        }

        let properties = schema.get("properties").and_then(Value::as_object);
        if let Some(properties) = properties {
            for (key, subschema) in properties {
                if let Some(member) = object.get(key) {
                    validate_at(subschema, member, &join_key(path, key), issues);
                }
            }
        }

        // Unknown members are only a violation when the schema opts out of
        // additional properties explicitly.
        if schema.get("additionalProperties") == Some(&Value::Bool(false)) {
            for key in object.keys() {
                let declared = properties
                    .map(|props| props.contains_key(key))
                    .unwrap_or(false);
                if !declared {
                    issues.push(SchemaIssue::new(
                        join_key(path, key),
                        "unexpected additional property",
                    ));
                }
            }
        }
    }

    if let Some(array) = value.as_array() {
        if let Some(min) = schema.get("minItems").and_then(Value::as_u64) {
            if (array.len() as u64) < min {
                issues.push(SchemaIssue::new(
                    path,
                    format!("expected at least {} items, got {}", min, array.len()),
                ));
            }
        }
        if let Some(max) = schema.get("maxItems").and_then(Value::as_u64) {
            if (array.len() as u64) > max {
                issues.push(SchemaIssue::new(
                    path,
                    format!("expected at most {} items, got {}", max, array.len()),
                ));
            }
        }
        if let Some(items) = schema.get("items") {
            for (index, element) in array.iter().enumerate() {
                validate_at(items, element, &join_index(path, index), issues);
            }
        }
    }

    if let (Some(text), Some(format_name)) =
        (value.as_str(), schema.get("format").and_then(Value::as_str))
    {
        if let Some(message) = format::check_format(format_name, text) {
            issues.push(SchemaIssue::new(path, message));
        }
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        "number" => value.is_number(),
        "integer" => match value {
            Value::Number(n) => {
                n.is_i64() || n.is_u64() || n.as_f64().map(|f| f.fract() == 0.0).unwrap_or(false)
            }
            _ => false,
        },
        // Unknown type keywords constrain nothing.
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn join_key(base: &str, key: &str) -> String {
    if base.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", base, key)
    }
}

fn join_index(base: &str, index: usize) -> String {
    format!("{}[{}]", base, index)
}

fn render_enum(allowed: &[Value]) -> String {
    allowed
        .iter()
        .map(|candidate| candidate.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_required_field_reports_field_path() {
        let schema = json!({
            "type": "object",
            "required": ["name"],
            "properties": { "name": { "type": "string" } },
        });

        let issues = validate(&schema, &json!({}));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "name");
        assert_eq!(issues[0].message, "required field missing");
    }

    #[test]
    fn type_mismatch_reports_expected_and_actual() {
        let schema = json!({
            "type": "object",
            "required": ["name"],
            "properties": { "name": { "type": "string" } },
        });

        let issues = validate(&schema, &json!({ "name": 123 }));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "name");
        assert_eq!(issues[0].message, "expected string, got number");
    }

    #[test]
    fn array_items_are_path_tagged_by_index() {
        let schema = json!({
            "type": "array",
            "items": {
                "type": "object",
                "required": ["product_variant_id", "quantity"],
                "properties": {
                    "product_variant_id": { "type": "string" },
                    "quantity": { "type": "integer" },
                },
            },
        });

        let issues = validate(&schema, &json!([{ "quantity": 1 }]));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "[0].product_variant_id");
        assert_eq!(issues[0].message, "required field missing");

        let issues = validate(
            &schema,
            &json!([{ "product_variant_id": "x", "quantity": "1" }]),
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "[0].quantity");
        assert_eq!(issues[0].message, "expected integer, got string");
    }

    #[test]
    fn sibling_branches_are_all_checked() {
        let schema = json!({
            "type": "object",
            "properties": {
                "a": { "type": "string" },
                "b": { "type": "integer" },
            },
        });

        let issues = validate(&schema, &json!({ "a": 1, "b": "two" }));
        let paths: Vec<_> = issues.iter().map(|i| i.path.as_str()).collect();
        assert!(paths.contains(&"a"));
        assert!(paths.contains(&"b"));
    }

    #[test]
    fn type_failure_suppresses_deeper_checks_in_subtree() {
        let schema = json!({
            "type": "object",
            "properties": {
                "nested": {
                    "type": "object",
                    "required": ["inner"],
                },
            },
        });

        // nested is the wrong shape entirely; the required check inside it
        // must not fire a second issue.
        let issues = validate(&schema, &json!({ "nested": [] }));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "nested");
    }

    #[test]
    fn integer_accepts_whole_floats_only() {
        let schema = json!({ "type": "integer" });
        assert!(validate(&schema, &json!(3)).is_empty());
        assert!(validate(&schema, &json!(3.0)).is_empty());
        assert_eq!(validate(&schema, &json!(3.5)).len(), 1);
    }

    #[test]
    fn enum_membership_is_exact() {
        let schema = json!({ "enum": ["asc", "desc"] });
        assert!(validate(&schema, &json!("asc")).is_empty());
        assert_eq!(validate(&schema, &json!("ascending")).len(), 1);
    }

    #[test]
    fn additional_properties_only_rejected_when_explicitly_false() {
        let open = json!({
            "type": "object",
            "properties": { "known": { "type": "string" } },
        });
        assert!(validate(&open, &json!({ "known": "a", "extra": 1 })).is_empty());

        let closed = json!({
            "type": "object",
            "properties": { "known": { "type": "string" } },
            "additionalProperties": false,
        });
        let issues = validate(&closed, &json!({ "known": "a", "extra": 1 }));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "extra");
    }

    #[test]
    fn min_and_max_items_bound_arrays() {
        let schema = json!({ "type": "array", "minItems": 1, "maxItems": 2 });
        assert_eq!(validate(&schema, &json!([])).len(), 1);
        assert!(validate(&schema, &json!([1])).is_empty());
        assert_eq!(validate(&schema, &json!([1, 2, 3])).len(), 1);
    }

    #[test]
    fn email_format_is_checked() {
        let schema = json!({ "type": "string", "format": "email" });
        assert!(validate(&schema, &json!("a@b.example")).is_empty());
        assert_eq!(validate(&schema, &json!("not-an-email")).len(), 1);
    }

    #[test]
    fn check_converts_issues_into_structured_error() {
        let schema = json!({ "type": "object", "required": ["name"] });
        let err = check(&schema, &json!({})).unwrap_err();
        match err {
            BridgeError::Validation(issues) => {
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].path, "name");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
