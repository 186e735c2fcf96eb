//! Fully resolved (provider, model, credentials) tuples tried by the fallback chain

use serde::{Deserialize, Serialize};

use crate::config::{ModelPricing, SecretString};
use crate::providers::registry::{ProviderCapabilities, ProviderId, WireProtocol};

/// max_tokens sent to providers that require one when the configuration leaves it unset
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Sampling parameters forwarded to every provider that understands them
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

/// One entry of a fallback chain
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderCandidate {
    /// Provider to call
    pub provider: ProviderId,

    /// Model name as the provider knows it
    pub model: String,

    /// Credential; empty for providers that need none
    pub api_key: SecretString,

    /// Base URL without the endpoint path
    pub base_url: String,

    /// API version header override
    pub api_version: Option<String>,

    /// Sampling parameters
    pub params: GenerationParams,

    /// Pricing used by the cost tracker
    pub pricing: Option<ModelPricing>,
}

impl ProviderCandidate {
    /// Create a candidate with the provider's default base URL and no credentials
    pub fn new(provider: ProviderId, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            api_key: SecretString::default(),
            base_url: provider.default_base_url().to_string(),
            api_version: None,
            params: GenerationParams::default(),
            pricing: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<SecretString>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_pricing(mut self, pricing: ModelPricing) -> Self {
        self.pricing = Some(pricing);
        self
    }

    /// Wire dialect of this candidate
    pub fn protocol(&self) -> WireProtocol {
        self.provider.protocol()
    }

    /// Native capabilities of this candidate
    pub fn capabilities(&self) -> ProviderCapabilities {
        self.provider.capabilities()
    }

    /// Configured max_tokens, or [`DEFAULT_MAX_TOKENS`] when the provider
    /// rejects requests without one
    pub fn max_tokens(&self) -> Option<u32> {
        self.params
            .max_tokens
            .or_else(|| self.capabilities().requires_max_tokens.then_some(DEFAULT_MAX_TOKENS))
    }

    /// `provider/model`, used in logs and outcomes
    pub fn label(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }

    /// Full URL of the generation endpoint
    pub fn endpoint_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.protocol().endpoint(&self.model)
        )
    }
}
