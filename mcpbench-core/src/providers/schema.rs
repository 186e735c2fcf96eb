//! Tool and schema translation
//!
//! Converts JSON-schema-like descriptors into what each provider accepts,
//! encodes/decodes tool-call arguments, and builds the prompt used when a
//! provider has no native structured-output support.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::protocol::{Arguments, Message, ResponseSchema, Role};
use crate::providers::error::ProviderError;
use crate::providers::gemini::types::{GeminiSchema, GeminiType};

/// Keys that describe a schema rather than constrain it
const ANNOTATION_KEYS: &[&str] = &["title", "$schema", "$id", "examples"];

/// Keys whose value is a single sub-schema
const NESTED_SCHEMA_KEYS: &[&str] = &["items", "additionalProperties", "not"];

/// Keys whose value is a list of sub-schemas
const SCHEMA_LIST_KEYS: &[&str] = &["anyOf", "oneOf", "allOf", "prefixItems"];

/// Keys whose value maps names to sub-schemas
const SCHEMA_MAP_KEYS: &[&str] = &["properties", "$defs", "definitions"];

/// System prompt used when the conversation has none and a schema must be described
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Strip annotation keys the destination rejects, recursively
///
/// Property *names* are preserved; only keywords are removed, so a property
/// called `title` survives.
pub fn sanitize_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                if ANNOTATION_KEYS.contains(&key.as_str()) {
                    continue;
                }
                let cleaned = if SCHEMA_MAP_KEYS.contains(&key.as_str()) {
                    match value {
                        Value::Object(children) => Value::Object(
                            children
                                .iter()
                                .map(|(name, child)| (name.clone(), sanitize_schema(child)))
                                .collect(),
                        ),
                        other => other.clone(),
                    }
                } else if NESTED_SCHEMA_KEYS.contains(&key.as_str()) {
                    sanitize_schema(value)
                } else if SCHEMA_LIST_KEYS.contains(&key.as_str()) {
                    match value {
                        Value::Array(items) => Value::Array(items.iter().map(sanitize_schema).collect()),
                        other => other.clone(),
                    }
                } else {
                    value.clone()
                };
                out.insert(key.clone(), cleaned);
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Primitive type named by a schema's `type`, and whether `null` is also allowed
fn schema_type(schema: &Map<String, Value>) -> (Option<String>, bool) {
    match schema.get("type") {
        Some(Value::String(t)) => (Some(t.clone()), false),
        Some(Value::Array(types)) => {
            let names: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
            let nullable = names.contains(&"null");
            let primary = names.into_iter().find(|t| *t != "null").map(str::to_string);
            (primary, nullable)
        }
        _ => (None, false),
    }
}

/// Convert a JSON-schema-like descriptor into Gemini's schema subset
///
/// Only type, description, properties, required, items and enum carry over.
/// A missing type is inferred from the shape (properties imply an object,
/// items imply an array) and otherwise defaults to object. `required` entries
/// that name no declared property are dropped.
pub fn to_gemini_schema(schema: &Value) -> GeminiSchema {
    let empty = Map::new();
    let map = schema.as_object().unwrap_or(&empty);
    let (declared, nullable) = schema_type(map);

    let schema_type = match declared.as_deref() {
        Some("string") => GeminiType::String,
        Some("number") => GeminiType::Number,
        Some("integer") => GeminiType::Integer,
        Some("boolean") => GeminiType::Boolean,
        Some("array") => GeminiType::Array,
        Some("object") => GeminiType::Object,
        Some("null") => GeminiType::String,
        _ if map.contains_key("properties") => GeminiType::Object,
        _ if map.contains_key("items") => GeminiType::Array,
        _ if map.contains_key("enum") => GeminiType::String,
        _ => GeminiType::Object,
    };

    let properties = match (schema_type, map.get("properties")) {
        (GeminiType::Object, Some(Value::Object(props))) => Some(
            props
                .iter()
                .map(|(name, child)| (name.clone(), to_gemini_schema(child)))
                .collect::<BTreeMap<_, _>>(),
        ),
        _ => None,
    };

    let required = properties.as_ref().and_then(|props| {
        let names: Vec<String> = map
            .get("required")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|name| props.contains_key(*name))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        (!names.is_empty()).then_some(names)
    });

    let items = match schema_type {
        GeminiType::Array => Some(Box::new(
            map.get("items")
                .map(to_gemini_schema)
                .unwrap_or_else(|| GeminiSchema::of(GeminiType::String)),
        )),
        _ => None,
    };

    let enum_values = map.get("enum").and_then(Value::as_array).map(|values| {
        values
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
    });

    GeminiSchema {
        schema_type,
        description: map
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        properties,
        required,
        items,
        enum_values,
        nullable: nullable.then_some(true),
    }
}

/// Encode arguments as the JSON string most providers carry on the wire
pub fn encode_arguments(arguments: &Arguments) -> String {
    Value::Object(arguments.clone()).to_string()
}

/// Decode a JSON argument string; an empty string means no arguments
pub fn decode_arguments(raw: &str) -> Result<Arguments, ProviderError> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    let value: Value = serde_json::from_str(raw).map_err(|e| {
        ProviderError::Protocol(format!("tool call arguments are not valid JSON: {}", e))
    })?;
    arguments_from_value(value)
}

/// Accept arguments that arrive as an object, a JSON string or null
pub fn arguments_from_value(value: Value) -> Result<Arguments, ProviderError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        Value::String(raw) => decode_arguments(&raw),
        other => Err(ProviderError::Protocol(format!(
            "tool call arguments must be a JSON object, got {}",
            other
        ))),
    }
}

/// Instruction appended to the system prompt describing the expected JSON
pub fn schema_instruction(schema: &ResponseSchema) -> String {
    format!(
        "\n\nPlease respond with valid JSON matching this schema: {}",
        schema.schema
    )
}

/// Append the schema instruction to the first system message, or prepend a
/// system message carrying it
pub fn with_schema_instruction(messages: &[Message], schema: &ResponseSchema) -> Vec<Message> {
    let instruction = schema_instruction(schema);
    let mut out = messages.to_vec();

    match out.first_mut() {
        Some(first) if first.role == Role::System => {
            let content = format!("{}{}", first.content_text(), instruction);
            first.content = Some(content);
        }
        _ => out.insert(0, Message::system(format!("{}{}", DEFAULT_SYSTEM_PROMPT, instruction))),
    }

    out
}
