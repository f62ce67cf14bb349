//! Asset schema loading and validation.
//!
//! The schema is a JSON document describing required fields and shapes.
//! Loading fails soft: a missing or unreadable schema degrades to a
//! minimal fallback requiring only the item id, never a hard failure.
//!
//! Validation covers the subset of JSON-Schema keywords the asset
//! contract uses: `type`, `required`, `properties`, `items`,
//! `minItems`, and `maxLength`. Violations name the offending path.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use insightforge_shared::{InsightForgeError, Result};

/// Minimal schema used when the configured document is unavailable.
pub fn fallback_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "required": ["item_id"],
        "properties": {
            "item_id": { "type": "string" }
        }
    })
}

/// Load the schema document, degrading to [`fallback_schema`] on any error.
pub fn load_schema(path: &Path) -> Value {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "schema unavailable, using minimal fallback");
            return fallback_schema();
        }
    };

    match serde_json::from_str(&content) {
        Ok(schema) => {
            debug!(path = %path.display(), "schema loaded");
            schema
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "schema unparsable, using minimal fallback");
            fallback_schema()
        }
    }
}

/// Validate `value` against `schema`, reporting the first violation.
pub fn validate(schema: &Value, value: &Value) -> Result<()> {
    validate_node(schema, value, "$")
}

fn validate_node(schema: &Value, value: &Value, path: &str) -> Result<()> {
    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        check_type(expected, value, path)?;
    }

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if value.get(name).is_none() {
                return Err(InsightForgeError::validation(format!(
                    "{path}: missing required field `{name}`"
                )));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (name, sub_schema) in properties {
            if let Some(sub_value) = value.get(name) {
                validate_node(sub_schema, sub_value, &format!("{path}.{name}"))?;
            }
        }
    }

    if let Some(array) = value.as_array() {
        if let Some(min_items) = schema.get("minItems").and_then(Value::as_u64) {
            if (array.len() as u64) < min_items {
                return Err(InsightForgeError::validation(format!(
                    "{path}: has {} items, expected at least {min_items}",
                    array.len()
                )));
            }
        }

        if let Some(item_schema) = schema.get("items") {
            for (i, element) in array.iter().enumerate() {
                validate_node(item_schema, element, &format!("{path}[{i}]"))?;
            }
        }
    }

    if let Some(s) = value.as_str() {
        if let Some(max_length) = schema.get("maxLength").and_then(Value::as_u64) {
            if (s.chars().count() as u64) > max_length {
                return Err(InsightForgeError::validation(format!(
                    "{path}: string exceeds maxLength {max_length}"
                )));
            }
        }
    }

    Ok(())
}

fn check_type(expected: &str, value: &Value, path: &str) -> Result<()> {
    let matches = match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        other => {
            return Err(InsightForgeError::validation(format!(
                "{path}: unsupported schema type `{other}`"
            )));
        }
    };

    if matches {
        Ok(())
    } else {
        Err(InsightForgeError::validation(format!(
            "{path}: expected {expected}"
        )))
    }
}
