//! Parsing of structured replies against a requested schema

use serde_json::Value;
use tracing::warn;

use crate::protocol::ResponseSchema;

/// Remove a surrounding Markdown code fence, if any
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line
    match body.split_once('\n') {
        Some((info, content)) if is_info_string(info) => content.trim(),
        _ => body.trim(),
    }
}

fn is_info_string(line: &str) -> bool {
    let line = line.trim();
    !line.contains(char::is_whitespace) && !line.starts_with(['{', '['])
}

/// Check a value against the subset of JSON schema we rely on: `type`,
/// `required`, `properties`, `items` and `enum`
pub fn check_conformance(value: &Value, schema: &Value) -> Result<(), String> {
    check_at("$", value, schema)
}

fn type_matches(value: &Value, name: &str) -> bool {
    match name {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "integer" => value.as_i64().is_some() || value.as_u64().is_some(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn check_at(path: &str, value: &Value, schema: &Value) -> Result<(), String> {
    let Some(schema) = schema.as_object() else {
        return Ok(());
    };

    match schema.get("type") {
        Some(Value::String(name)) if !type_matches(value, name) => {
            return Err(format!("{}: expected {}", path, name));
        }
        Some(Value::Array(names)) => {
            let accepted = names
                .iter()
                .filter_map(Value::as_str)
                .any(|name| type_matches(value, name));
            if !accepted {
                return Err(format!("{}: value does not match any allowed type", path));
            }
        }
        _ => {}
    }

    if let Some(Value::Array(allowed)) = schema.get("enum") {
        if !allowed.contains(value) {
            return Err(format!("{}: value is not one of the allowed values", path));
        }
    }

    if let Value::Object(object) = value {
        if let Some(Value::Array(required)) = schema.get("required") {
            for name in required.iter().filter_map(Value::as_str) {
                if !object.contains_key(name) {
                    return Err(format!("{}: missing required field '{}'", path, name));
                }
            }
        }
        if let Some(Value::Object(properties)) = schema.get("properties") {
            for (name, child_schema) in properties {
                if let Some(child) = object.get(name) {
                    check_at(&format!("{}.{}", path, name), child, child_schema)?;
                }
            }
        }
    }

    if let (Value::Array(items), Some(item_schema)) = (value, schema.get("items")) {
        for (index, item) in items.iter().enumerate() {
            check_at(&format!("{}[{}]", path, index), item, item_schema)?;
        }
    }

    Ok(())
}

/// Parse reply text as JSON conforming to `schema`
pub fn parse_structured(text: &str, schema: &ResponseSchema) -> Result<Value, String> {
    let candidate = strip_code_fence(text);
    let value: Value = serde_json::from_str(candidate).map_err(|e| format!("not valid JSON: {}", e))?;
    check_conformance(&value, &schema.schema)?;
    Ok(value)
}

/// Parse reply text, logging and returning `None` when it does not conform
///
/// The raw text stays available on the response either way.
pub fn parse_or_none(text: Option<&str>, schema: &ResponseSchema) -> Option<Value> {
    let text = text?;
    match parse_structured(text, schema) {
        Ok(value) => Some(value),
        Err(reason) => {
            warn!("Structured output for schema '{}' rejected: {}", schema.name, reason);
            None
        }
    }
}
