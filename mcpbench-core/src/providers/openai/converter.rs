//! Conversion between the canonical protocol and OpenAI format

use super::types::*;
use crate::protocol::{CanonicalRequest, CanonicalResponse, Message, ResponseSchema, ToolCall, ToolDefinition, Usage};
use crate::providers::candidate::ProviderCandidate;
use crate::providers::error::ProviderError;
use crate::providers::schema::{decode_arguments, encode_arguments, sanitize_schema, with_schema_instruction};
use crate::providers::structured::parse_or_none;

/// Convert a canonical request to OpenAI format
///
/// Providers with native schema support get a `json_schema` response format.
/// The others get the schema described in the system prompt, plus
/// `json_object` mode where the provider has it.
pub fn to_openai_request(
    request: &CanonicalRequest,
    candidate: &ProviderCandidate,
) -> Result<OpenAIRequest, ProviderError> {
    let capabilities = candidate.capabilities();

    let (messages, response_format) = match &request.schema {
        Some(schema) if capabilities.native_schema => (
            request.messages.clone(),
            Some(OpenAIResponseFormat {
                format_type: "json_schema".to_string(),
                json_schema: Some(OpenAIJsonSchema {
                    name: schema.name.clone(),
                    schema: sanitize_schema(&schema.schema),
                }),
            }),
        ),
        Some(schema) => (
            with_schema_instruction(&request.messages, schema),
            capabilities.supports_json_mode.then(|| OpenAIResponseFormat {
                format_type: "json_object".to_string(),
                json_schema: None,
            }),
        ),
        None => (request.messages.clone(), None),
    };

    let tools = if request.has_tools() {
        if !capabilities.supports_tools {
            return Err(ProviderError::Protocol(format!(
                "{} does not support tool calling",
                candidate.provider
            )));
        }
        Some(request.tools.iter().map(to_openai_tool).collect())
    } else {
        None
    };

    let params = &candidate.params;
    Ok(OpenAIRequest {
        model: candidate.model.clone(),
        messages: messages.iter().map(to_openai_message).collect(),
        temperature: params.temperature,
        max_tokens: candidate.max_tokens(),
        top_p: params.top_p,
        stop: params.stop.clone(),
        frequency_penalty: params.frequency_penalty,
        presence_penalty: params.presence_penalty,
        seed: params.seed,
        response_format,
        tools,
    })
}

/// Convert a canonical message to OpenAI format
fn to_openai_message(message: &Message) -> OpenAIMessage {
    let tool_calls = message
        .tool_calls
        .as_ref()
        .filter(|calls| !calls.is_empty())
        .map(|calls| calls.iter().map(tool_call_to_openai).collect());

    OpenAIMessage {
        role: message.role.as_str().to_string(),
        content: message.content.clone().map(OpenAIContent::Text),
        tool_calls,
        tool_call_id: message.tool_call_id.clone(),
    }
}

/// Convert a canonical tool call to OpenAI format
pub fn tool_call_to_openai(call: &ToolCall) -> OpenAIToolCall {
    OpenAIToolCall {
        id: call.id.clone(),
        tool_type: "function".to_string(),
        function: OpenAIFunctionCall {
            name: call.name.clone(),
            arguments: encode_arguments(&call.arguments),
        },
    }
}

/// Convert an OpenAI tool call to canonical form
pub fn tool_call_from_openai(call: &OpenAIToolCall) -> Result<ToolCall, ProviderError> {
    let arguments = decode_arguments(&call.function.arguments)?;
    if call.id.is_empty() {
        Ok(ToolCall::with_local_id(call.function.name.clone(), arguments))
    } else {
        Ok(ToolCall::new(call.id.clone(), call.function.name.clone(), arguments))
    }
}

/// Convert a tool definition to OpenAI format
fn to_openai_tool(tool: &ToolDefinition) -> OpenAITool {
    OpenAITool {
        tool_type: "function".to_string(),
        function: OpenAIFunction {
            name: tool.name.clone(),
            description: (!tool.description.is_empty()).then(|| tool.description.clone()),
            parameters: Some(tool.parameter_schema.clone()),
        },
    }
}

/// Convert an OpenAI response to canonical form
pub fn from_openai_response(
    response: &OpenAIResponse,
    schema: Option<&ResponseSchema>,
) -> Result<CanonicalResponse, ProviderError> {
    let choice = response
        .choices
        .first()
        .ok_or_else(|| ProviderError::Protocol("response contains no choices".to_string()))?;

    let text = choice
        .message
        .content
        .as_ref()
        .map(OpenAIContent::text)
        .filter(|text| !text.is_empty());

    let tool_calls = match &choice.message.tool_calls {
        Some(calls) if !calls.is_empty() => Some(
            calls
                .iter()
                .map(tool_call_from_openai)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        _ => None,
    };

    let parsed = schema.and_then(|schema| parse_or_none(text.as_deref(), schema));

    Ok(CanonicalResponse {
        text,
        tool_calls,
        parsed,
        usage: response
            .usage
            .map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        model: response.model.clone(),
        finish_reason: choice.finish_reason.clone(),
    })
}
