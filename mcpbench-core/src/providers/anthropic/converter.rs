//! Conversion between the canonical protocol and Anthropic format

use serde_json::{json, Value};

use super::types::*;
use crate::protocol::{CanonicalRequest, CanonicalResponse, Message, ResponseSchema, Role, ToolCall, ToolDefinition, Usage};
use crate::providers::candidate::ProviderCandidate;
pub use crate::providers::candidate::DEFAULT_MAX_TOKENS;
use crate::providers::error::ProviderError;
use crate::providers::schema::{arguments_from_value, sanitize_schema, with_schema_instruction};
use crate::providers::structured::parse_or_none;

/// Convert a canonical request to Anthropic format
///
/// All system messages are joined into the top-level `system` field. A
/// requested schema is described in the system prompt since the API has no
/// structured-output mode.
pub fn to_anthropic_request(
    request: &CanonicalRequest,
    candidate: &ProviderCandidate,
) -> Result<AnthropicRequest, ProviderError> {
    let messages = match &request.schema {
        Some(schema) => with_schema_instruction(&request.messages, schema),
        None => request.messages.clone(),
    };

    let system_parts: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(Message::content_text)
        .filter(|text| !text.is_empty())
        .collect();
    let system = (!system_parts.is_empty()).then(|| system_parts.join("\n"));

    let mut turns: Vec<AnthropicMessage> = Vec::new();
    for message in messages.iter().filter(|m| m.role != Role::System) {
        match message.role {
            Role::User => turns.push(AnthropicMessage {
                role: "user".to_string(),
                content: AnthropicContent::Text(message.content_text().to_string()),
            }),
            Role::Assistant if message.calls().is_empty() => turns.push(AnthropicMessage {
                role: "assistant".to_string(),
                content: AnthropicContent::Text(message.content_text().to_string()),
            }),
            Role::Assistant => {
                let mut blocks = Vec::new();
                if !message.content_text().is_empty() {
                    blocks.push(AnthropicBlock::Text {
                        text: message.content_text().to_string(),
                    });
                }
                blocks.extend(message.calls().iter().map(tool_call_to_anthropic));
                turns.push(AnthropicMessage {
                    role: "assistant".to_string(),
                    content: AnthropicContent::Blocks(blocks),
                });
            }
            Role::Tool => {
                let block = AnthropicBlock::ToolResult {
                    tool_use_id: message.tool_call_id.clone().unwrap_or_default(),
                    content: message.content_text().to_string(),
                };
                push_tool_result(&mut turns, block);
            }
            Role::System => {}
        }
    }

    let tools = if request.has_tools() {
        Some(request.tools.iter().map(to_anthropic_tool).collect())
    } else {
        None
    };

    let max_tokens = candidate.max_tokens().ok_or_else(|| {
        ProviderError::Configuration(format!("{} needs max_tokens", candidate.label()))
    })?;

    let params = &candidate.params;
    Ok(AnthropicRequest {
        model: candidate.model.clone(),
        max_tokens,
        messages: turns,
        system,
        temperature: params.temperature,
        top_p: params.top_p,
        stop_sequences: params.stop.clone(),
        tools,
    })
}

/// Consecutive tool results answer one assistant turn and must share a user turn
fn push_tool_result(turns: &mut Vec<AnthropicMessage>, block: AnthropicBlock) {
    if let Some(AnthropicMessage {
        role,
        content: AnthropicContent::Blocks(blocks),
    }) = turns.last_mut()
    {
        let only_results = blocks
            .iter()
            .all(|b| matches!(b, AnthropicBlock::ToolResult { .. }));
        if role.as_str() == "user" && only_results {
            blocks.push(block);
            return;
        }
    }
    turns.push(AnthropicMessage {
        role: "user".to_string(),
        content: AnthropicContent::Blocks(vec![block]),
    });
}

/// Convert a canonical tool call to a `tool_use` block
pub fn tool_call_to_anthropic(call: &ToolCall) -> AnthropicBlock {
    AnthropicBlock::ToolUse {
        id: call.id.clone(),
        name: call.name.clone(),
        input: Value::Object(call.arguments.clone()),
    }
}

/// Convert a `tool_use` block to canonical form; other blocks yield `None`
pub fn tool_call_from_anthropic(block: &AnthropicBlock) -> Result<Option<ToolCall>, ProviderError> {
    match block {
        AnthropicBlock::ToolUse { id, name, input } => {
            let arguments = arguments_from_value(input.clone())?;
            let call = if id.is_empty() {
                ToolCall::with_local_id(name.clone(), arguments)
            } else {
                ToolCall::new(id.clone(), name.clone(), arguments)
            };
            Ok(Some(call))
        }
        _ => Ok(None),
    }
}

fn to_anthropic_tool(tool: &ToolDefinition) -> AnthropicTool {
    let input_schema = match &tool.parameter_schema {
        Value::Object(map) if !map.is_empty() => sanitize_schema(&tool.parameter_schema),
        _ => json!({ "type": "object", "properties": {} }),
    };
    AnthropicTool {
        name: tool.name.clone(),
        description: (!tool.description.is_empty()).then(|| tool.description.clone()),
        input_schema,
    }
}

/// Convert an Anthropic response to canonical form
pub fn from_anthropic_response(
    response: &AnthropicResponse,
    schema: Option<&ResponseSchema>,
) -> Result<CanonicalResponse, ProviderError> {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for block in &response.content {
        if let AnthropicBlock::Text { text: part } = block {
            text.push_str(part);
        } else if let Some(call) = tool_call_from_anthropic(block)? {
            tool_calls.push(call);
        }
    }

    let text = (!text.is_empty()).then_some(text);
    let parsed = schema.and_then(|schema| parse_or_none(text.as_deref(), schema));

    Ok(CanonicalResponse {
        text,
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        parsed,
        usage: response
            .usage
            .map(|u| Usage::new(u.input_tokens, u.output_tokens)),
        model: response.model.clone(),
        finish_reason: response.stop_reason.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::registry::ProviderId;
    use serde_json::Map;

    fn candidate() -> ProviderCandidate {
        ProviderCandidate::new(ProviderId::Anthropic, "claude-3-5-sonnet-latest")
    }

    #[test]
    fn test_system_messages_are_collapsed() {
        let request = CanonicalRequest::new(vec![
            Message::system("First."),
            Message::system("Second."),
            Message::user("hi"),
        ]);
        let wire = to_anthropic_request(&request, &candidate()).unwrap();
        assert_eq!(wire.system.as_deref(), Some("First.\nSecond."));
        assert_eq!(wire.messages.len(), 1);
        assert_eq!(wire.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_parallel_tool_results_share_one_user_turn() {
        let request = CanonicalRequest::new(vec![
            Message::user("weather in Paris and Rome?"),
            Message::assistant_tool_calls(
                None,
                vec![
                    ToolCall::new("t1", "weather", Map::new()),
                    ToolCall::new("t2", "weather", Map::new()),
                ],
            ),
            Message::tool("t1", "sunny"),
            Message::tool("t2", "rain"),
        ]);
        let wire = to_anthropic_request(&request, &candidate()).unwrap();
        assert_eq!(wire.messages.len(), 3);
        match &wire.messages[2].content {
            AnthropicContent::Blocks(blocks) => assert_eq!(blocks.len(), 2),
            other => panic!("expected blocks, got {:?}", other),
        }
    }

    #[test]
    fn test_tool_schema_title_removed() {
        let request = CanonicalRequest::new(vec![Message::user("hi")]).with_tools(vec![
            ToolDefinition::new(
                "search",
                "Search the web",
                json!({"title": "SearchArgs", "type": "object", "properties": {"q": {"type": "string"}}}),
            ),
        ]);
        let wire = to_anthropic_request(&request, &candidate()).unwrap();
        let tool = &wire.tools.unwrap()[0];
        assert!(tool.input_schema.get("title").is_none());
        assert_eq!(tool.description.as_deref(), Some("Search the web"));
    }

    #[test]
    fn test_response_with_tool_use() {
        let response: AnthropicResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "model": "claude-3-5-sonnet-latest",
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "toolu_1", "name": "weather", "input": {"city": "Paris"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }))
        .unwrap();
        let canonical = from_anthropic_response(&response, None).unwrap();
        assert_eq!(canonical.text.as_deref(), Some("Let me check."));
        assert_eq!(canonical.tool_calls.unwrap()[0].arguments["city"], json!("Paris"));
        assert_eq!(canonical.usage.unwrap().total_tokens, 15);
    }
}
