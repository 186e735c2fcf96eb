//! Conversion between the canonical protocol and the text completion format
//!
//! The endpoint takes a single prompt string, so the conversation is flattened
//! and structured output is requested through the prompt.

use super::types::*;
use crate::protocol::{CanonicalRequest, CanonicalResponse, Message, ResponseSchema, Usage};
use crate::providers::candidate::ProviderCandidate;
use crate::providers::error::ProviderError;
use crate::providers::schema::with_schema_instruction;
use crate::providers::structured::parse_or_none;

/// Join message contents into one prompt, separated by blank lines
pub fn flatten_prompt(messages: &[Message]) -> String {
    messages
        .iter()
        .map(Message::content_text)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Convert a canonical request to a completion request
pub fn to_completion_request(
    request: &CanonicalRequest,
    candidate: &ProviderCandidate,
) -> Result<CompletionRequest, ProviderError> {
    if request.has_tools() {
        return Err(ProviderError::Protocol(format!(
            "{} speaks the text completion protocol, which has no tool calling",
            candidate.label()
        )));
    }

    let prompt = match &request.schema {
        Some(schema) => flatten_prompt(&with_schema_instruction(&request.messages, schema)),
        None => flatten_prompt(&request.messages),
    };

    let params = &candidate.params;
    Ok(CompletionRequest {
        model: candidate.model.clone(),
        prompt,
        temperature: params.temperature,
        max_tokens: candidate.max_tokens(),
        top_p: params.top_p,
        frequency_penalty: params.frequency_penalty,
        presence_penalty: params.presence_penalty,
        seed: params.seed,
        stop: params.stop.clone(),
    })
}

/// Convert a completion response to canonical form
pub fn from_completion_response(
    response: &CompletionResponse,
    schema: Option<&ResponseSchema>,
) -> Result<CanonicalResponse, ProviderError> {
    let choice = response
        .choices
        .first()
        .ok_or_else(|| ProviderError::Protocol("response contains no choices".to_string()))?;

    let text = (!choice.text.is_empty()).then(|| choice.text.clone());
    let parsed = schema.and_then(|schema| parse_or_none(text.as_deref(), schema));

    Ok(CanonicalResponse {
        text,
        tool_calls: None,
        parsed,
        usage: response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }),
        model: response.model.clone(),
        finish_reason: choice.finish_reason.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ToolDefinition;
    use crate::providers::registry::ProviderId;
    use serde_json::json;

    fn candidate() -> ProviderCandidate {
        ProviderCandidate::new(ProviderId::Vllm, "openai/gpt-oss-20b")
    }

    #[test]
    fn test_prompt_flattening() {
        let request = CanonicalRequest::new(vec![Message::system("Rules."), Message::user("Question?")]);
        let wire = to_completion_request(&request, &candidate()).unwrap();
        assert_eq!(wire.prompt, "Rules.\n\nQuestion?");
    }

    #[test]
    fn test_tools_unsupported() {
        let request = CanonicalRequest::new(vec![Message::user("hi")])
            .with_tools(vec![ToolDefinition::new("f", "", json!({"type": "object"}))]);
        assert!(matches!(
            to_completion_request(&request, &candidate()),
            Err(ProviderError::Protocol(_))
        ));
    }

    #[test]
    fn test_schema_goes_into_prompt() {
        let request = CanonicalRequest::new(vec![Message::user("hi")])
            .with_schema(ResponseSchema::new("out", json!({"type": "object"})));
        let wire = to_completion_request(&request, &candidate()).unwrap();
        assert!(wire.prompt.contains("Please respond with valid JSON matching this schema"));
    }
}
