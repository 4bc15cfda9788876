//! Lightweight shape check of a parsed value against a JSON schema
//!
//! Covers `type` (single or union), `required`, `properties` and `items`.
//! Anything else in the schema is ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

fn type_matches(value: &Value, expected: &str) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        // Unknown type names are not enforced
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

fn check(value: &Value, schema: &Value, path: &str, errors: &mut Vec<String>) {
    let expected: Vec<&str> = match &schema["type"] {
        Value::String(t) => vec![t.as_str()],
        Value::Array(types) => types.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    if !expected.is_empty() && !expected.iter().any(|t| type_matches(value, t)) {
        errors.push(format!(
            "{}: expected {}, got {}",
            path,
            expected.join(" | "),
            type_name(value)
        ));
        return;
    }

    if let Value::Object(map) = value {
        if let Some(required) = schema["required"].as_array() {
            for key in required.iter().filter_map(Value::as_str) {
                if !map.contains_key(key) {
                    errors.push(format!("{}: missing required property '{}'", path, key));
                }
            }
        }
        if let Some(properties) = schema["properties"].as_object() {
            for (key, property_schema) in properties {
                if let Some(child) = map.get(key) {
                    check(child, property_schema, &format!("{}.{}", path, key), errors);
                }
            }
        }
    }

    if let (Value::Array(items), Some(item_schema)) = (value, schema.get("items")) {
        for (i, item) in items.iter().enumerate() {
            check(item, item_schema, &format!("{}[{}]", path, i), errors);
        }
    }
}

/// Check `value` against the subset of `schema` described in the module docs
pub fn validate_json_schema(value: &Value, schema: &Value) -> SchemaValidation {
    let mut errors = Vec::new();
    check(value, schema, "$", &mut errors);
    SchemaValidation {
        valid: errors.is_empty(),
        errors,
    }
}
