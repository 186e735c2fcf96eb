//! Pure translation between the canonical model and provider payloads
//!
//! The wire dialect is chosen once from the candidate's provider; everything
//! after that works on a tagged payload so there is no per-call string
//! dispatch on provider names.

use serde_json::Value;

use crate::protocol::{validate_messages, CanonicalRequest, CanonicalResponse, ResponseSchema, Usage};
use crate::providers::anthropic::{self, AnthropicRequest, AnthropicResponse};
use crate::providers::candidate::ProviderCandidate;
use crate::providers::completion::{self, CompletionRequest, CompletionResponse};
use crate::providers::error::ProviderError;
use crate::providers::gemini::{self, GeminiRequest, GeminiResponse};
use crate::providers::openai::{self, OpenAIRequest, OpenAIResponse};
use crate::providers::registry::WireProtocol;

/// Request body in a provider's dialect
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderPayload {
    OpenAi(OpenAIRequest),
    Anthropic(AnthropicRequest),
    Gemini(GeminiRequest),
    Completion(CompletionRequest),
}

impl ProviderPayload {
    /// Dialect of this payload
    pub fn protocol(&self) -> WireProtocol {
        match self {
            ProviderPayload::OpenAi(_) => WireProtocol::OpenAiChat,
            ProviderPayload::Anthropic(_) => WireProtocol::AnthropicMessages,
            ProviderPayload::Gemini(_) => WireProtocol::GeminiGenerateContent,
            ProviderPayload::Completion(_) => WireProtocol::TextCompletion,
        }
    }

    /// JSON body to send
    pub fn to_json(&self) -> Result<Value, ProviderError> {
        let value = match self {
            ProviderPayload::OpenAi(body) => serde_json::to_value(body),
            ProviderPayload::Anthropic(body) => serde_json::to_value(body),
            ProviderPayload::Gemini(body) => serde_json::to_value(body),
            ProviderPayload::Completion(body) => serde_json::to_value(body),
        };
        value.map_err(|e| ProviderError::Configuration(format!("failed to serialize request: {}", e)))
    }
}

/// Reply body in a provider's dialect
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderReply {
    OpenAi(OpenAIResponse),
    Anthropic(AnthropicResponse),
    Gemini(GeminiResponse),
    Completion(CompletionResponse),
}

impl ProviderReply {
    /// Decode a reply body; a shape we cannot read is a protocol error
    pub fn parse(protocol: WireProtocol, body: Value) -> Result<Self, ProviderError> {
        let reply = match protocol {
            WireProtocol::OpenAiChat => serde_json::from_value(body).map(ProviderReply::OpenAi),
            WireProtocol::AnthropicMessages => serde_json::from_value(body).map(ProviderReply::Anthropic),
            WireProtocol::GeminiGenerateContent => serde_json::from_value(body).map(ProviderReply::Gemini),
            WireProtocol::TextCompletion => serde_json::from_value(body).map(ProviderReply::Completion),
        };
        reply.map_err(|e| ProviderError::Protocol(format!("unexpected response shape: {}", e)))
    }

    /// Dialect of this reply
    pub fn protocol(&self) -> WireProtocol {
        match self {
            ProviderReply::OpenAi(_) => WireProtocol::OpenAiChat,
            ProviderReply::Anthropic(_) => WireProtocol::AnthropicMessages,
            ProviderReply::Gemini(_) => WireProtocol::GeminiGenerateContent,
            ProviderReply::Completion(_) => WireProtocol::TextCompletion,
        }
    }

    /// Token usage, when the provider reported it
    pub fn usage(&self) -> Option<Usage> {
        match self {
            ProviderReply::OpenAi(reply) => reply
                .usage
                .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens)),
            ProviderReply::Anthropic(reply) => reply
                .usage
                .map(|u| Usage::new(u.input_tokens, u.output_tokens)),
            ProviderReply::Gemini(reply) => reply
                .usage_metadata
                .map(|u| Usage::new(u.prompt_token_count, u.candidates_token_count)),
            ProviderReply::Completion(reply) => reply
                .usage
                .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens)),
        }
    }
}

/// Build the provider payload for a candidate
pub fn to_provider_format(
    request: &CanonicalRequest,
    candidate: &ProviderCandidate,
) -> Result<ProviderPayload, ProviderError> {
    validate_messages(&request.messages)?;

    Ok(match candidate.protocol() {
        WireProtocol::OpenAiChat => ProviderPayload::OpenAi(openai::to_openai_request(request, candidate)?),
        WireProtocol::AnthropicMessages => {
            ProviderPayload::Anthropic(anthropic::to_anthropic_request(request, candidate)?)
        }
        WireProtocol::GeminiGenerateContent => {
            ProviderPayload::Gemini(gemini::to_gemini_request(request, candidate)?)
        }
        WireProtocol::TextCompletion => {
            ProviderPayload::Completion(completion::to_completion_request(request, candidate)?)
        }
    })
}

/// Build the canonical response from a provider reply
///
/// When `schema` is given the reply text is parsed against it; a reply that
/// does not conform leaves `parsed` empty and keeps the raw text.
pub fn from_provider_reply(
    reply: &ProviderReply,
    schema: Option<&ResponseSchema>,
) -> Result<CanonicalResponse, ProviderError> {
    match reply {
        ProviderReply::OpenAi(body) => openai::from_openai_response(body, schema),
        ProviderReply::Anthropic(body) => anthropic::from_anthropic_response(body, schema),
        ProviderReply::Gemini(body) => gemini::from_gemini_response(body, schema),
        ProviderReply::Completion(body) => completion::from_completion_response(body, schema),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Message;
    use crate::providers::registry::ProviderId;
    use serde_json::json;

    #[test]
    fn test_dialect_follows_provider() {
        let request = CanonicalRequest::new(vec![Message::user("hi")]);
        for (provider, protocol) in [
            (ProviderId::OpenAI, WireProtocol::OpenAiChat),
            (ProviderId::Ollama, WireProtocol::OpenAiChat),
            (ProviderId::Anthropic, WireProtocol::AnthropicMessages),
            (ProviderId::Gemini, WireProtocol::GeminiGenerateContent),
            (ProviderId::Vllm, WireProtocol::TextCompletion),
        ] {
            let candidate = ProviderCandidate::new(provider, "m");
            let payload = to_provider_format(&request, &candidate).unwrap();
            assert_eq!(payload.protocol(), protocol);
        }
    }

    #[test]
    fn test_malformed_conversation_rejected_before_translation() {
        let request = CanonicalRequest::new(vec![Message::tool("nope", "x")]);
        let candidate = ProviderCandidate::new(ProviderId::OpenAI, "gpt-4o");
        assert!(matches!(
            to_provider_format(&request, &candidate),
            Err(ProviderError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_unreadable_reply_is_protocol_error() {
        let err = ProviderReply::parse(WireProtocol::OpenAiChat, json!({"choices": "nope"})).unwrap_err();
        assert!(matches!(err, ProviderError::Protocol(_)));
    }

    #[test]
    fn test_usage_extraction() {
        let reply = ProviderReply::parse(
            WireProtocol::AnthropicMessages,
            json!({"content": [], "usage": {"input_tokens": 100, "output_tokens": 20}}),
        )
        .unwrap();
        assert_eq!(reply.usage(), Some(Usage::new(100, 20)));
    }
}
