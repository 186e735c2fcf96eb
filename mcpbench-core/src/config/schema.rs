//! Configuration schema structures with serde support

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::error::ValidationError;
use super::secrets::SecretString;
use crate::protocol::Usage;
use crate::providers::candidate::GenerationParams;
use crate::providers::registry::ProviderId;
use crate::providers::retry::RetryPolicy;

/// Root configuration for an LLM invoker
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// Provider of the primary model
    #[serde(default = "default_provider")]
    pub provider: ProviderId,

    /// Primary model; may carry a `provider/` prefix
    pub model_name: String,

    /// Models tried in order after the primary; unprefixed names inherit the
    /// primary provider
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_models: Vec<String>,

    /// API key for the primary provider (supports environment variable interpolation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<SecretString>,

    /// Base URL override for the primary provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// API version header override (Anthropic)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling seed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,

    /// Frequency penalty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    /// Presence penalty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,

    /// Per-attempt timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries per candidate after the first attempt
    #[serde(default)]
    pub max_retries: u32,

    /// Base of the exponential backoff, in seconds
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: f64,

    /// Random spread applied to each backoff delay (0.0 to 1.0)
    #[serde(default)]
    pub jitter_factor: f64,

    /// Wait for the provider's Retry-After instead of the computed backoff
    #[serde(default)]
    pub respect_retry_after: bool,

    /// Accumulate spend from reported usage
    #[serde(default = "default_true")]
    pub track_cost: bool,

    /// Per-model pricing, keyed by model name
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub pricing: HashMap<String, ModelPricing>,
}

/// Price of a model per 1K tokens (in USD)
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelPricing {
    /// Cost per 1K input tokens
    pub cost_per_1k_input: f64,

    /// Cost per 1K output tokens
    pub cost_per_1k_output: f64,
}

impl ModelPricing {
    /// Create pricing
    pub fn new(cost_per_1k_input: f64, cost_per_1k_output: f64) -> Self {
        Self {
            cost_per_1k_input,
            cost_per_1k_output,
        }
    }

    /// Cost of one call
    pub fn cost(&self, usage: &Usage) -> f64 {
        (usage.prompt_tokens as f64 / 1000.0) * self.cost_per_1k_input
            + (usage.completion_tokens as f64 / 1000.0) * self.cost_per_1k_output
    }
}

// Default value functions
fn default_provider() -> ProviderId {
    ProviderId::OpenAI
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_base_delay_secs() -> f64 {
    10.0
}

fn default_true() -> bool {
    true
}

impl LlmConfig {
    /// Create a configuration for a single model with defaults everywhere else
    pub fn new(provider: ProviderId, model_name: impl Into<String>) -> Self {
        Self {
            provider,
            model_name: model_name.into(),
            fallback_models: Vec::new(),
            api_key: None,
            base_url: None,
            api_version: None,
            temperature: None,
            top_p: None,
            max_tokens: None,
            seed: None,
            frequency_penalty: None,
            presence_penalty: None,
            stop: None,
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
            base_delay_secs: default_base_delay_secs(),
            jitter_factor: 0.0,
            respect_retry_after: false,
            track_cost: true,
            pricing: HashMap::new(),
        }
    }

    /// Set fallback models
    pub fn with_fallback_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_models = models.into_iter().map(Into::into).collect();
        self
    }

    /// Set the primary API key
    pub fn with_api_key(mut self, api_key: impl Into<SecretString>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the primary base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set retry count and backoff base
    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay_secs = base_delay.as_secs_f64();
        self
    }

    /// Set pricing for a model
    pub fn with_pricing(mut self, model: impl Into<String>, pricing: ModelPricing) -> Self {
        self.pricing.insert(model.into(), pricing);
        self
    }

    /// Per-attempt timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Retry policy applied to every candidate
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::try_from_secs_f64(self.base_delay_secs).unwrap_or(
                if self.base_delay_secs > 0.0 { Duration::MAX } else { Duration::ZERO },
            ),
            jitter_factor: self.jitter_factor,
            respect_retry_after: self.respect_retry_after,
        }
    }

    /// Sampling parameters shared by every candidate
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
            seed: self.seed,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
            stop: self.stop.clone(),
        }
    }

    /// Validate field values
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.model_name.trim().is_empty() {
            return Err(ValidationError::required("model_name"));
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ValidationError::out_of_range(
                    "temperature",
                    format!("must be between 0.0 and 2.0, got {}", temperature),
                ));
            }
        }

        if let Some(top_p) = self.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Err(ValidationError::out_of_range(
                    "top_p",
                    format!("must be between 0.0 and 1.0, got {}", top_p),
                ));
            }
        }

        for (field, penalty) in [
            ("frequency_penalty", self.frequency_penalty),
            ("presence_penalty", self.presence_penalty),
        ] {
            if let Some(value) = penalty {
                if !(-2.0..=2.0).contains(&value) {
                    return Err(ValidationError::out_of_range(
                        field,
                        format!("must be between -2.0 and 2.0, got {}", value),
                    ));
                }
            }
        }

        if self.max_tokens == Some(0) {
            return Err(ValidationError::out_of_range("max_tokens", "must be greater than 0"));
        }

        if self.timeout_secs == 0 {
            return Err(ValidationError::out_of_range("timeout_secs", "must be greater than 0"));
        }

        if self.base_delay_secs <= 0.0 || Duration::try_from_secs_f64(self.base_delay_secs).is_err() {
            return Err(ValidationError::out_of_range(
                "base_delay_secs",
                format!("must be a positive number of seconds, got {}", self.base_delay_secs),
            ));
        }

        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ValidationError::out_of_range(
                "jitter_factor",
                format!("must be between 0.0 and 1.0, got {}", self.jitter_factor),
            ));
        }

        if let Some(base_url) = &self.base_url {
            url::Url::parse(base_url)
                .map_err(|e| ValidationError::invalid_url("base_url", e.to_string()))?;
        }

        for (model, pricing) in &self.pricing {
            for (field, value) in [
                ("cost_per_1k_input", pricing.cost_per_1k_input),
                ("cost_per_1k_output", pricing.cost_per_1k_output),
            ] {
                if !value.is_finite() || value < 0.0 {
                    return Err(ValidationError::out_of_range(
                        format!("pricing.{}.{}", model, field),
                        format!("must be a non-negative number, got {}", value),
                    ));
                }
            }
        }

        Ok(())
    }
}
