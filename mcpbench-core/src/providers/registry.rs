//! Provider registry
//!
//! Each supported provider is a [`ProviderId`]. A provider speaks exactly one
//! [`WireProtocol`]; OpenAI-compatible vendors share the OpenAI chat dialect and
//! only differ in base URL, credentials and capabilities.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::providers::error::ProviderError;

/// Default `anthropic-version` header value
pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";

/// Wire dialect a provider speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireProtocol {
    /// `/chat/completions` with OpenAI message shapes
    #[serde(rename = "openai_chat")]
    OpenAiChat,
    /// Anthropic `/messages`
    #[serde(rename = "anthropic_messages")]
    AnthropicMessages,
    /// Gemini `:generateContent`
    #[serde(rename = "gemini_generate_content")]
    GeminiGenerateContent,
    /// Legacy prompt-in/text-out `/completions`
    #[serde(rename = "text_completion")]
    TextCompletion,
}

impl WireProtocol {
    /// Endpoint path appended to the provider base URL
    pub fn endpoint(&self, model: &str) -> String {
        match self {
            WireProtocol::OpenAiChat => "/chat/completions".to_string(),
            WireProtocol::AnthropicMessages => "/messages".to_string(),
            WireProtocol::GeminiGenerateContent => format!("/models/{}:generateContent", model),
            WireProtocol::TextCompletion => "/completions".to_string(),
        }
    }

    /// Authentication and versioning headers for this dialect
    pub fn headers(&self, api_key: &str, api_version: Option<&str>) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        match self {
            WireProtocol::OpenAiChat | WireProtocol::TextCompletion => {
                if !api_key.is_empty() {
                    headers.insert("Authorization".to_string(), format!("Bearer {}", api_key));
                }
            }
            WireProtocol::AnthropicMessages => {
                headers.insert("x-api-key".to_string(), api_key.to_string());
                headers.insert(
                    "anthropic-version".to_string(),
                    api_version.unwrap_or(ANTHROPIC_API_VERSION).to_string(),
                );
            }
            WireProtocol::GeminiGenerateContent => {
                headers.insert("x-goog-api-key".to_string(), api_key.to_string());
            }
        }
        headers
    }
}

/// What a provider can do natively
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    /// Does the provider support tool calling?
    pub supports_tools: bool,

    /// Does the provider accept a JSON schema for structured output?
    pub native_schema: bool,

    /// Does the provider support a plain JSON-object mode?
    pub supports_json_mode: bool,

    /// Must every request carry max_tokens?
    pub requires_max_tokens: bool,
}

/// Supported providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    OpenAI,
    Anthropic,
    Gemini,
    DeepSeek,
    Grok,
    Mistral,
    OpenRouter,
    Ollama,
    LiteLlm,
    Vllm,
}

impl ProviderId {
    /// Every registered provider
    pub const ALL: [ProviderId; 10] = [
        ProviderId::OpenAI,
        ProviderId::Anthropic,
        ProviderId::Gemini,
        ProviderId::DeepSeek,
        ProviderId::Grok,
        ProviderId::Mistral,
        ProviderId::OpenRouter,
        ProviderId::Ollama,
        ProviderId::LiteLlm,
        ProviderId::Vllm,
    ];

    /// Identifier used in configuration and model references
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenAI => "openai",
            ProviderId::Anthropic => "anthropic",
            ProviderId::Gemini => "gemini",
            ProviderId::DeepSeek => "deepseek",
            ProviderId::Grok => "grok",
            ProviderId::Mistral => "mistral",
            ProviderId::OpenRouter => "openrouter",
            ProviderId::Ollama => "ollama",
            ProviderId::LiteLlm => "litellm",
            ProviderId::Vllm => "vllm",
        }
    }

    /// Wire dialect this provider speaks
    pub fn protocol(&self) -> WireProtocol {
        match self {
            ProviderId::Anthropic => WireProtocol::AnthropicMessages,
            ProviderId::Gemini => WireProtocol::GeminiGenerateContent,
            ProviderId::Vllm => WireProtocol::TextCompletion,
            _ => WireProtocol::OpenAiChat,
        }
    }

    /// Base URL used when neither configuration nor environment supplies one
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderId::OpenAI => "https://api.openai.com/v1",
            ProviderId::Anthropic => "https://api.anthropic.com/v1",
            ProviderId::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            ProviderId::DeepSeek => "https://api.deepseek.com/v1",
            ProviderId::Grok => "https://api.x.ai/v1",
            ProviderId::Mistral => "https://api.mistral.ai/v1",
            ProviderId::OpenRouter => "https://openrouter.ai/api/v1",
            ProviderId::Ollama => "http://localhost:11434/v1",
            ProviderId::LiteLlm => "http://localhost:4000/v1",
            ProviderId::Vllm => "http://localhost:2024/v1",
        }
    }

    /// Environment variable holding the API key
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderId::OpenAI => Some("OPENAI_API_KEY"),
            ProviderId::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderId::Gemini => Some("GEMINI_API_KEY"),
            ProviderId::DeepSeek => Some("DEEPSEEK_API_KEY"),
            ProviderId::Grok => Some("GROK_API_KEY"),
            ProviderId::Mistral => Some("MISTRAL_API_KEY"),
            ProviderId::OpenRouter => Some("OPENROUTER_API_KEY"),
            ProviderId::Ollama => None,
            ProviderId::LiteLlm => Some("LITELLM_API_KEY"),
            ProviderId::Vllm => Some("VLLM_API_KEY"),
        }
    }

    /// Environment variable overriding the base URL
    pub fn base_url_env(&self) -> Option<&'static str> {
        Some(match self {
            ProviderId::OpenAI => "OPENAI_BASE_URL",
            ProviderId::Anthropic => "ANTHROPIC_BASE_URL",
            ProviderId::Gemini => "GEMINI_BASE_URL",
            ProviderId::DeepSeek => "DEEPSEEK_BASE_URL",
            ProviderId::Grok => "GROK_BASE_URL",
            ProviderId::Mistral => "MISTRAL_BASE_URL",
            ProviderId::OpenRouter => "OPENROUTER_BASE_URL",
            ProviderId::Ollama => "OLLAMA_URL",
            ProviderId::LiteLlm => "LITELLM_BASE_URL",
            ProviderId::Vllm => "VLLM_BASE_URL",
        })
    }

    /// Environment variables this provider reads
    pub fn env_vars(&self) -> Vec<&'static str> {
        self.api_key_env()
            .into_iter()
            .chain(self.base_url_env())
            .collect()
    }

    /// Native capabilities
    pub fn capabilities(&self) -> ProviderCapabilities {
        let chat = ProviderCapabilities {
            supports_tools: true,
            native_schema: false,
            supports_json_mode: true,
            requires_max_tokens: false,
        };

        match self {
            ProviderId::OpenAI | ProviderId::Grok | ProviderId::OpenRouter => ProviderCapabilities {
                native_schema: true,
                ..chat
            },
            ProviderId::DeepSeek
            | ProviderId::Mistral
            | ProviderId::Ollama
            | ProviderId::LiteLlm => chat,
            ProviderId::Anthropic => ProviderCapabilities {
                supports_tools: true,
                native_schema: false,
                supports_json_mode: false,
                requires_max_tokens: true,
            },
            ProviderId::Gemini => ProviderCapabilities {
                supports_tools: true,
                native_schema: true,
                supports_json_mode: true,
                requires_max_tokens: false,
            },
            ProviderId::Vllm => ProviderCapabilities {
                supports_tools: false,
                native_schema: false,
                supports_json_mode: false,
                requires_max_tokens: false,
            },
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        ProviderId::ALL
            .into_iter()
            .find(|id| id.as_str() == lowered)
            .ok_or_else(|| ProviderError::Configuration(format!("unknown provider '{}'", s)))
    }
}

/// A `provider/model` reference resolved against a default provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub provider: ProviderId,
    pub model: String,
}

impl ModelRef {
    /// Resolve a model reference
    ///
    /// `"anthropic/claude-3-5-sonnet"` selects the Anthropic provider. A
    /// reference without a known provider prefix keeps the whole string as the
    /// model name (gateways use slashes in their own names) and inherits
    /// `default_provider`.
    pub fn parse(reference: &str, default_provider: ProviderId) -> Self {
        let reference = reference.trim();
        if let Some((prefix, rest)) = reference.split_once('/') {
            if let Ok(provider) = prefix.parse::<ProviderId>() {
                if !rest.is_empty() {
                    return Self {
                        provider,
                        model: rest.to_string(),
                    };
                }
            }
        }
        Self {
            provider: default_provider,
            model: reference.to_string(),
        }
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}
