//! Invocation entry point
//!
//! [`LlmInvoker`] turns an [`LlmConfig`] into an ordered list of provider
//! candidates and runs each request through the fallback chain. Credentials
//! and base URLs are resolved from a [`Context`] that can be replaced at
//! runtime.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tracing::{debug, info};

use crate::config::{ConfigValidator, Context, LlmConfig};
use crate::protocol::{CanonicalRequest, CanonicalResponse, Message, ResponseSchema, ToolDefinition};
use crate::providers::adapter::AdapterRegistry;
use crate::providers::candidate::ProviderCandidate;
use crate::providers::cost::CostTracker;
use crate::providers::error::InvocationError;
use crate::providers::registry::{ModelRef, ProviderId};
use crate::providers::retry::{Sleeper, TokioSleeper};
use crate::providers::routing::{CancellationHandle, FallbackChain, InvocationOutcome};

/// Per-call overrides of the configured behavior
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Retries per candidate after the first attempt
    pub max_retries: Option<u32>,

    /// Base of the exponential backoff
    pub base_delay: Option<Duration>,

    /// Per-attempt timeout
    pub timeout: Option<Duration>,

    /// Replaces the configured fallback models for this call
    pub fallback_models: Option<Vec<String>>,

    /// Coarse-grained cancellation checked between candidates
    pub cancel: Option<CancellationHandle>,
}

impl GenerateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = Some(base_delay);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_fallback_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_models = Some(models.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_cancellation(mut self, handle: CancellationHandle) -> Self {
        self.cancel = Some(handle);
        self
    }
}

/// Multi-provider LLM invoker
pub struct LlmInvoker {
    config: LlmConfig,
    context: RwLock<Context>,
    candidates: RwLock<Vec<ProviderCandidate>>,
    registry: Arc<AdapterRegistry>,
    sleeper: Arc<dyn Sleeper>,
    cost: Arc<CostTracker>,
}

impl LlmInvoker {
    /// Create an invoker calling providers over HTTP
    pub fn new(config: LlmConfig) -> Result<Self, InvocationError> {
        let registry = AdapterRegistry::http_default()?;
        Self::with_registry(config, Arc::new(registry))
    }

    /// Create an invoker with a custom adapter registry
    pub fn with_registry(config: LlmConfig, registry: Arc<AdapterRegistry>) -> Result<Self, InvocationError> {
        ConfigValidator::new()
            .validate(&config)
            .map_err(|e| InvocationError::Configuration(e.to_string()))?;

        let context = Context::default();
        let candidates = build_candidates(&config, &context, &config.fallback_models);
        info!(
            "Configured {} candidate(s), primary {}",
            candidates.len(),
            candidates.first().map(ProviderCandidate::label).unwrap_or_default()
        );

        Ok(Self {
            config,
            context: RwLock::new(context),
            candidates: RwLock::new(candidates),
            registry,
            sleeper: Arc::new(TokioSleeper),
            cost: Arc::new(CostTracker::new()),
        })
    }

    /// Replace the sleeper used between retries
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Replace the environment and re-resolve every candidate
    pub fn set_context(&self, context: Context) {
        let candidates = build_candidates(&self.config, &context, &self.config.fallback_models);
        debug!("Context replaced; {} candidate(s) re-resolved", candidates.len());
        *write(&self.candidates) = candidates;
        *write(&self.context) = context;
    }

    /// Current context
    pub fn context(&self) -> Context {
        read(&self.context).clone()
    }

    /// Resolved fallback chain, primary first
    pub fn candidates(&self) -> Vec<ProviderCandidate> {
        read(&self.candidates).clone()
    }

    /// Generate a response
    ///
    /// Returns the chain outcome; only malformed input and configuration
    /// mistakes are raised as errors.
    pub async fn generate(
        &self,
        messages: Vec<Message>,
        schema: Option<ResponseSchema>,
        tools: Vec<ToolDefinition>,
        options: &GenerateOptions,
    ) -> Result<InvocationOutcome, InvocationError> {
        let mut policy = self.config.retry_policy();
        if let Some(max_retries) = options.max_retries {
            policy.max_retries = max_retries;
        }
        if let Some(base_delay) = options.base_delay {
            if base_delay.is_zero() {
                return Err(InvocationError::Configuration("base_delay must be greater than zero".to_string()));
            }
            policy.base_delay = base_delay;
        }
        let timeout = options.timeout.unwrap_or_else(|| self.config.timeout());
        if timeout.is_zero() {
            return Err(InvocationError::Configuration("timeout must be greater than zero".to_string()));
        }

        let candidates = match &options.fallback_models {
            Some(fallbacks) => build_candidates(&self.config, &read(&self.context), fallbacks),
            None => self.candidates(),
        };

        let mut request = CanonicalRequest::new(messages).with_tools(tools);
        if let Some(schema) = schema {
            request = request.with_schema(schema);
        }

        let mut chain = FallbackChain::new(self.registry.clone())
            .with_retry_policy(policy)
            .with_sleeper(self.sleeper.clone())
            .with_timeout(timeout);
        if self.config.track_cost {
            chain = chain.with_cost_tracker(self.cost.clone());
        }

        chain.run(&candidates, &request, options.cancel.as_ref()).await
    }

    /// Single-turn convenience over [`generate`](Self::generate)
    pub async fn get_response(
        &self,
        system_message: &str,
        user_message: &str,
        schema: Option<ResponseSchema>,
    ) -> Result<Option<CanonicalResponse>, InvocationError> {
        let mut messages = Vec::with_capacity(2);
        if !system_message.is_empty() {
            messages.push(Message::system(system_message));
        }
        messages.push(Message::user(user_message));

        let outcome = self
            .generate(messages, schema, Vec::new(), &GenerateOptions::default())
            .await?;
        Ok(outcome.into_response())
    }

    /// Spend recorded so far, in USD
    pub fn total_cost(&self) -> f64 {
        self.cost.total()
    }

    pub fn reset_cost(&self) {
        self.cost.reset();
    }

    /// Shared cost tracker
    pub fn cost_tracker(&self) -> Arc<CostTracker> {
        self.cost.clone()
    }

    /// Credential variables the chain needs that are currently unset
    pub fn list_undefined_env_vars(&self) -> Vec<String> {
        let context = read(&self.context);
        let primary = primary_provider(&self.config);
        let mut missing: Vec<String> = Vec::new();

        for candidate in read(&self.candidates).iter() {
            let Some(var) = candidate.provider.api_key_env() else {
                continue;
            };
            if candidate.provider == primary && self.config.api_key.is_some() {
                continue;
            }
            if context.get_env(var).is_none() && !missing.iter().any(|m| m == var) {
                missing.push(var.to_string());
            }
        }
        missing
    }

    /// Whether the primary provider supports tool calling
    pub fn support_tool_call(&self) -> bool {
        primary_provider(&self.config).capabilities().supports_tools
    }
}

fn primary_provider(config: &LlmConfig) -> ProviderId {
    ModelRef::parse(&config.model_name, config.provider).provider
}

/// Resolve the primary model and `fallbacks` into candidates
///
/// For the primary provider an explicit context override wins over the
/// configured value, which wins over the inherited process environment.
fn build_candidates(config: &LlmConfig, context: &Context, fallbacks: &[String]) -> Vec<ProviderCandidate> {
    let primary = ModelRef::parse(&config.model_name, config.provider);
    let params = config.generation_params();

    std::iter::once(primary.clone())
        .chain(fallbacks.iter().map(|reference| ModelRef::parse(reference, primary.provider)))
        .map(|model_ref| {
            let provider = model_ref.provider;
            let is_primary = provider == primary.provider;

            let api_key = lookup(
                context,
                provider.api_key_env(),
                config.api_key.as_ref().filter(|_| is_primary).map(|key| key.expose_secret()),
            );
            let base_url = lookup(
                context,
                provider.base_url_env(),
                config.base_url.as_deref().filter(|_| is_primary),
            );

            let mut candidate = ProviderCandidate::new(provider, model_ref.model.clone())
                .with_params(params.clone());
            if let Some(api_key) = api_key {
                candidate = candidate.with_api_key(api_key);
            }
            if let Some(base_url) = base_url {
                candidate = candidate.with_base_url(base_url);
            }
            if is_primary {
                candidate.api_version = config.api_version.clone();
            }
            if let Some(pricing) = config.pricing.get(&model_ref.model) {
                candidate = candidate.with_pricing(*pricing);
            }
            candidate
        })
        .collect()
}

fn lookup(context: &Context, var: Option<&str>, configured: Option<&str>) -> Option<String> {
    let overridden = var.and_then(|var| context.env.get(var)).filter(|value| !value.is_empty());
    overridden
        .cloned()
        .or_else(|| configured.map(str::to_string))
        .or_else(|| var.and_then(|var| context.get_env(var)))
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelPricing;

    fn isolated(vars: &[(&str, &str)]) -> Context {
        Context::isolated(vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn test_unprefixed_fallbacks_inherit_primary_provider() {
        let config = LlmConfig::new(ProviderId::Anthropic, "claude-3-5-sonnet")
            .with_fallback_models(["claude-3-5-haiku", "gemini/gemini-2.0-flash"]);
        let candidates = build_candidates(&config, &isolated(&[]), &config.fallback_models);

        let labels: Vec<String> = candidates.iter().map(ProviderCandidate::label).collect();
        assert_eq!(
            labels,
            ["anthropic/claude-3-5-sonnet", "anthropic/claude-3-5-haiku", "gemini/gemini-2.0-flash"]
        );
    }

    #[test]
    fn test_credential_precedence() {
        let config = LlmConfig::new(ProviderId::OpenAI, "gpt-4o")
            .with_api_key("from-config")
            .with_fallback_models(["anthropic/claude-3-5-haiku"]);

        let context = isolated(&[("ANTHROPIC_API_KEY", "ant-key")]);
        let candidates = build_candidates(&config, &context, &config.fallback_models);
        assert_eq!(candidates[0].api_key.expose_secret(), "from-config");
        assert_eq!(candidates[1].api_key.expose_secret(), "ant-key");

        let context = isolated(&[("OPENAI_API_KEY", "override")]);
        let candidates = build_candidates(&config, &context, &config.fallback_models);
        assert_eq!(candidates[0].api_key.expose_secret(), "override");
        assert!(candidates[1].api_key.is_empty());
    }

    #[test]
    fn test_base_url_from_context_and_pricing_attached() {
        let config = LlmConfig::new(ProviderId::Vllm, "gpt-oss-20b")
            .with_pricing("gpt-oss-20b", ModelPricing::new(0.0, 0.0));
        let context = isolated(&[("VLLM_BASE_URL", "http://gpu-box:8000/v1")]);
        let candidates = build_candidates(&config, &context, &[]);

        assert_eq!(candidates[0].base_url, "http://gpu-box:8000/v1");
        assert!(candidates[0].pricing.is_some());
    }
}
