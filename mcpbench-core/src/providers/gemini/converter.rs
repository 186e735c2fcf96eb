//! Conversion between the canonical protocol and Gemini format

use std::collections::HashMap;

use serde_json::{json, Value};

use super::types::*;
use crate::protocol::{CanonicalRequest, CanonicalResponse, Message, ResponseSchema, Role, ToolCall, ToolDefinition, Usage};
use crate::providers::candidate::ProviderCandidate;
use crate::providers::error::ProviderError;
use crate::providers::schema::{arguments_from_value, to_gemini_schema};
use crate::providers::structured::parse_or_none;

// -- Outbound: canonical request -> Gemini wire request --

/// Convert a canonical request to Gemini format
///
/// System messages become `systemInstruction`, assistant turns use the `model`
/// role and tool results become `functionResponse` parts named after the call
/// they answer. A requested schema is sent natively as `responseSchema`.
pub fn to_gemini_request(
    request: &CanonicalRequest,
    candidate: &ProviderCandidate,
) -> Result<GeminiRequest, ProviderError> {
    let system_parts: Vec<&str> = request
        .messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(Message::content_text)
        .filter(|text| !text.is_empty())
        .collect();
    let system_instruction = (!system_parts.is_empty()).then(|| GeminiContent {
        role: None,
        parts: vec![GeminiPart::text(system_parts.join("\n\n"))],
    });

    let mut call_names: HashMap<&str, &str> = HashMap::new();
    let mut contents: Vec<GeminiContent> = Vec::new();

    for message in &request.messages {
        match message.role {
            Role::System => {}
            Role::User => {
                if !message.content_text().is_empty() {
                    contents.push(GeminiContent {
                        role: Some("user".to_string()),
                        parts: vec![GeminiPart::text(message.content_text())],
                    });
                }
            }
            Role::Assistant => {
                let mut parts = Vec::new();
                if !message.content_text().is_empty() {
                    parts.push(GeminiPart::text(message.content_text()));
                }
                for call in message.calls() {
                    call_names.insert(call.id.as_str(), call.name.as_str());
                    parts.push(tool_call_to_gemini(call));
                }
                if !parts.is_empty() {
                    contents.push(GeminiContent {
                        role: Some("model".to_string()),
                        parts,
                    });
                }
            }
            Role::Tool => {
                let call_id = message.tool_call_id.as_deref().unwrap_or_default();
                let name = call_names.get(call_id).copied().ok_or_else(|| {
                    ProviderError::MalformedInput(format!(
                        "tool result '{}' does not answer any earlier tool call",
                        call_id
                    ))
                })?;
                let part = GeminiPart {
                    function_response: Some(GeminiFunctionResponse {
                        id: Some(call_id.to_string()),
                        name: name.to_string(),
                        response: tool_response_value(message.content_text()),
                    }),
                    ..Default::default()
                };
                push_function_response(&mut contents, part);
            }
        }
    }

    let params = &candidate.params;
    let mut generation_config = GeminiGenerationConfig {
        temperature: params.temperature,
        top_p: params.top_p,
        max_output_tokens: candidate.max_tokens(),
        seed: params.seed,
        frequency_penalty: params.frequency_penalty,
        presence_penalty: params.presence_penalty,
        stop_sequences: params.stop.clone(),
        ..Default::default()
    };
    if let Some(schema) = &request.schema {
        generation_config.response_mime_type = Some("application/json".to_string());
        generation_config.response_schema = Some(to_gemini_schema(&schema.schema));
    }

    let tools = request.has_tools().then(|| {
        vec![GeminiTool {
            function_declarations: request.tools.iter().map(to_gemini_declaration).collect(),
        }]
    });

    Ok(GeminiRequest {
        contents,
        system_instruction,
        tools,
        generation_config: (!generation_config.is_empty()).then_some(generation_config),
    })
}

/// Tool output as the JSON object Gemini expects in `functionResponse.response`
fn tool_response_value(content: &str) -> Value {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(map)) => Value::Object(map),
        Ok(other) => json!({ "result": other }),
        Err(_) => json!({ "result": content }),
    }
}

/// Responses to parallel calls go back in a single user turn
fn push_function_response(contents: &mut Vec<GeminiContent>, part: GeminiPart) {
    if let Some(last) = contents.last_mut() {
        let only_responses = !last.parts.is_empty()
            && last.parts.iter().all(|p| p.function_response.is_some());
        if last.role.as_deref() == Some("user") && only_responses {
            last.parts.push(part);
            return;
        }
    }
    contents.push(GeminiContent {
        role: Some("user".to_string()),
        parts: vec![part],
    });
}

/// Convert a canonical tool call to a `functionCall` part
///
/// The call id is sent along; the matching `functionResponse` echoes it.
pub fn tool_call_to_gemini(call: &ToolCall) -> GeminiPart {
    GeminiPart {
        function_call: Some(GeminiFunctionCall {
            id: (!call.id.is_empty()).then(|| call.id.clone()),
            name: call.name.clone(),
            args: Value::Object(call.arguments.clone()),
        }),
        ..Default::default()
    }
}

/// Convert a `functionCall` to canonical form, generating an id when Gemini sent none
pub fn tool_call_from_gemini(call: &GeminiFunctionCall) -> Result<ToolCall, ProviderError> {
    let arguments = arguments_from_value(call.args.clone())?;
    Ok(match call.id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => ToolCall::new(id, call.name.clone(), arguments),
        None => ToolCall::with_local_id(call.name.clone(), arguments),
    })
}

fn to_gemini_declaration(tool: &ToolDefinition) -> GeminiFunctionDeclaration {
    let has_properties = tool
        .parameter_schema
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(|props| !props.is_empty());

    GeminiFunctionDeclaration {
        name: tool.name.clone(),
        description: tool.description.clone(),
        // Gemini rejects OBJECT parameters with no properties
        parameters: has_properties.then(|| to_gemini_schema(&tool.parameter_schema)),
    }
}

// -- Inbound: Gemini wire response -> canonical --

/// Convert a Gemini response to canonical form
pub fn from_gemini_response(
    response: &GeminiResponse,
    schema: Option<&ResponseSchema>,
) -> Result<CanonicalResponse, ProviderError> {
    let candidate = response
        .candidates
        .first()
        .ok_or_else(|| ProviderError::Protocol("response contains no candidates".to_string()))?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for part in &candidate.content.parts {
        if part.thought == Some(true) {
            continue;
        }
        if let Some(part_text) = &part.text {
            text.push_str(part_text);
        }
        if let Some(call) = &part.function_call {
            tool_calls.push(tool_call_from_gemini(call)?);
        }
    }

    let text = (!text.is_empty()).then_some(text);
    let parsed = schema.and_then(|schema| parse_or_none(text.as_deref(), schema));

    Ok(CanonicalResponse {
        text,
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        parsed,
        usage: response.usage_metadata.map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        }),
        model: response.model_version.clone(),
        finish_reason: candidate.finish_reason.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::registry::ProviderId;
    use serde_json::Map;

    fn candidate() -> ProviderCandidate {
        ProviderCandidate::new(ProviderId::Gemini, "gemini-2.0-flash")
    }

    #[test]
    fn test_roles_and_system_instruction() {
        let request = CanonicalRequest::new(vec![
            Message::system("Be brief."),
            Message::user("hi"),
            Message::assistant("hello"),
        ]);
        let wire = to_gemini_request(&request, &candidate()).unwrap();
        let value = serde_json::to_value(&wire).unwrap();

        assert_eq!(value["systemInstruction"]["parts"][0]["text"], json!("Be brief."));
        assert_eq!(value["contents"][1]["role"], json!("model"));
        assert!(value.get("generationConfig").is_none());
    }

    #[test]
    fn test_function_response_named_after_call() {
        let request = CanonicalRequest::new(vec![
            Message::user("time?"),
            Message::assistant_tool_calls(None, vec![ToolCall::new("c1", "clock", Map::new())]),
            Message::tool("c1", "12:00"),
        ]);
        let wire = to_gemini_request(&request, &candidate()).unwrap();
        let call = wire.contents[1].parts[0].function_call.as_ref().unwrap();
        assert_eq!(call.id.as_deref(), Some("c1"));
        let response = wire.contents[2].parts[0].function_response.as_ref().unwrap();
        assert_eq!(response.id.as_deref(), Some("c1"));
        assert_eq!(response.name, "clock");
        assert_eq!(response.response, json!({"result": "12:00"}));
    }

    #[test]
    fn test_native_schema_in_generation_config() {
        let request = CanonicalRequest::new(vec![Message::user("hi")])
            .with_schema(ResponseSchema::new("out", json!({"type": "object", "properties": {"a": {"type": "string"}}})));
        let wire = to_gemini_request(&request, &candidate()).unwrap();
        let config = wire.generation_config.unwrap();
        assert_eq!(config.response_mime_type.as_deref(), Some("application/json"));
        assert_eq!(config.response_schema.unwrap().schema_type, GeminiType::Object);
    }

    #[test]
    fn test_function_call_gets_local_id() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"functionCall": {"name": "clock", "args": {}}}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 2, "totalTokenCount": 5}
        }))
        .unwrap();
        let canonical = from_gemini_response(&response, None).unwrap();
        let calls = canonical.tool_calls.unwrap();
        assert_eq!(calls[0].name, "clock");
        assert!(!calls[0].id.is_empty());
        assert_eq!(canonical.usage.unwrap().total_tokens, 5);
    }
}
