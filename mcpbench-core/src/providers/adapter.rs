//! Provider adapter trait and registry
//!
//! An adapter performs exactly one call against one candidate: translate,
//! send, translate back. Retries and fallback live above it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::error;

use crate::http::{HttpClient, HttpExecutor, HttpRequest, RequestOptions};
use crate::protocol::{CanonicalRequest, CanonicalResponse};
use crate::providers::candidate::ProviderCandidate;
use crate::providers::error::ProviderError;
use crate::providers::registry::{ProviderId, WireProtocol};
use crate::providers::translate::{from_provider_reply, to_provider_format, ProviderReply};

/// A single successful call
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterReply {
    /// Canonical form of the reply
    pub response: CanonicalResponse,

    /// Provider reply as received, when there was one
    pub raw: Option<ProviderReply>,
}

impl AdapterReply {
    /// Reply with no raw provider payload attached
    pub fn canonical(response: CanonicalResponse) -> Self {
        Self { response, raw: None }
    }
}

/// Core provider trait: one call, no retries
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Perform one call against `candidate`
    async fn invoke(
        &self,
        candidate: &ProviderCandidate,
        request: &CanonicalRequest,
        timeout: Duration,
    ) -> Result<AdapterReply, ProviderError>;
}

/// Adapter speaking one wire dialect over HTTP
pub struct HttpAdapter {
    protocol: WireProtocol,
    executor: Arc<dyn HttpExecutor>,
}

impl HttpAdapter {
    /// Create an adapter for `protocol` sending through `executor`
    pub fn new(protocol: WireProtocol, executor: Arc<dyn HttpExecutor>) -> Self {
        Self { protocol, executor }
    }

    /// Dialect this adapter speaks
    pub fn protocol(&self) -> WireProtocol {
        self.protocol
    }
}

#[async_trait]
impl ProviderAdapter for HttpAdapter {
    fn name(&self) -> &str {
        match self.protocol {
            WireProtocol::OpenAiChat => "openai-chat",
            WireProtocol::AnthropicMessages => "anthropic-messages",
            WireProtocol::GeminiGenerateContent => "gemini-generate-content",
            WireProtocol::TextCompletion => "text-completion",
        }
    }

    async fn invoke(
        &self,
        candidate: &ProviderCandidate,
        request: &CanonicalRequest,
        timeout: Duration,
    ) -> Result<AdapterReply, ProviderError> {
        if candidate.protocol() != self.protocol {
            return Err(ProviderError::Configuration(format!(
                "{} adapter cannot serve {}",
                self.name(),
                candidate.label()
            )));
        }

        let payload = to_provider_format(request, candidate)?;
        let http_request = HttpRequest {
            url: candidate.endpoint_url(),
            headers: self
                .protocol
                .headers(candidate.api_key.expose_secret(), candidate.api_version.as_deref()),
            body: payload.to_json()?,
        };
        let options = RequestOptions::new()
            .with_timeout(timeout)
            .with_label(candidate.label());

        let body = self.executor.execute_json(http_request, options).await?;

        let decoded = ProviderReply::parse(self.protocol, body)
            .and_then(|reply| from_provider_reply(&reply, request.schema.as_ref()).map(|r| (r, reply)));

        match decoded {
            Ok((response, reply)) => Ok(AdapterReply {
                response,
                raw: Some(reply),
            }),
            Err(err) => {
                error!("Could not interpret reply from {}: {}", candidate.label(), err);
                Err(err)
            }
        }
    }
}

/// Adapters keyed by provider
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<ProviderId, Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry serving every provider over HTTP through `executor`
    pub fn with_http(executor: Arc<dyn HttpExecutor>) -> Self {
        let mut by_protocol: HashMap<WireProtocol, Arc<dyn ProviderAdapter>> = HashMap::new();
        let mut registry = Self::new();
        for provider in ProviderId::ALL {
            let protocol = provider.protocol();
            let adapter = by_protocol
                .entry(protocol)
                .or_insert_with(|| Arc::new(HttpAdapter::new(protocol, executor.clone())))
                .clone();
            registry.adapters.insert(provider, adapter);
        }
        registry
    }

    /// Registry backed by a fresh pooled HTTP client
    pub fn http_default() -> Result<Self, ProviderError> {
        Ok(Self::with_http(Arc::new(HttpClient::new()?)))
    }

    /// Register (or replace) the adapter for a provider
    pub fn register(&mut self, provider: ProviderId, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(provider, adapter);
    }

    /// Builder form of [`register`](Self::register)
    pub fn with_adapter(mut self, provider: ProviderId, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.register(provider, adapter);
        self
    }

    /// Adapter for a provider
    pub fn get(&self, provider: ProviderId) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&provider).cloned()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut providers: Vec<&str> = self.adapters.keys().map(ProviderId::as_str).collect();
        providers.sort_unstable();
        f.debug_struct("AdapterRegistry").field("providers", &providers).finish()
    }
}
