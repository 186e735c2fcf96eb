//! reqwest-backed [`HttpExecutor`]

use crate::http::error::map_http_error;
use crate::http::{HttpExecutor, HttpRequest, RequestOptions};
use crate::providers::error::ProviderError;
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Replies larger than this are rejected (10MB)
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

const USER_AGENT: &str = concat!("mcpbench/", env!("CARGO_PKG_VERSION"));

/// Pooled client shared by every HTTP adapter
///
/// Only the connect timeout is set on the client; the per-attempt timeout
/// travels with each request in [`RequestOptions`].
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    max_response_size: usize,
}

impl HttpClient {
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_config(Duration::from_secs(10), 10)
    }

    pub fn with_config(connect_timeout: Duration, max_idle_per_host: usize) -> Result<Self, ProviderError> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(connect_timeout)
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| ProviderError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_response_size: MAX_RESPONSE_SIZE,
        })
    }

    pub fn with_max_response_size(mut self, max_response_size: usize) -> Self {
        self.max_response_size = max_response_size;
        self
    }

    fn ensure_json(response: &Response) -> Result<(), ProviderError> {
        let Some(content_type) = response.headers().get(reqwest::header::CONTENT_TYPE) else {
            return Ok(());
        };
        let content_type = content_type.to_str().unwrap_or_default().to_ascii_lowercase();
        if content_type.contains("application/json") {
            Ok(())
        } else {
            Err(ProviderError::Protocol(format!("Expected application/json, got: {}", content_type)))
        }
    }

    fn ensure_size(&self, size: usize, request_id: Uuid) -> Result<(), ProviderError> {
        if size > self.max_response_size {
            return Err(ProviderError::Protocol(format!(
                "Response size {} exceeds maximum {} [request_id: {}]",
                size, self.max_response_size, request_id
            )));
        }
        Ok(())
    }
}

/// Classify a transport failure before any status was received
fn map_send_error(e: reqwest::Error, label: &str, timeout: Duration, request_id: Uuid) -> ProviderError {
    if e.is_timeout() {
        warn!("{} timed out after {:?} [request_id: {}]", label, timeout, request_id);
        ProviderError::Timeout(format!("no response within {:?} [request_id: {}]", timeout, request_id))
    } else if e.is_builder() {
        ProviderError::Configuration(format!("{} [request_id: {}]", e, request_id))
    } else {
        warn!("{} unreachable [request_id: {}]: {}", label, request_id, e);
        let kind = if e.is_connect() { "Connection failed: " } else { "" };
        ProviderError::Network(format!("{}{} [request_id: {}]", kind, e, request_id))
    }
}

#[async_trait]
impl HttpExecutor for HttpClient {
    async fn execute_json(&self, request: HttpRequest, options: RequestOptions) -> Result<Value, ProviderError> {
        let RequestOptions {
            request_id,
            timeout,
            label,
        } = options;
        let label = label.as_deref().unwrap_or("provider");
        debug!("POST {} for {} [request_id: {}]", request.url, label, request_id);

        let mut builder = self
            .client
            .post(&request.url)
            .timeout(timeout)
            .header("X-Request-ID", request_id.to_string())
            .json(&request.body);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_send_error(e, label, timeout, request_id))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.ok();
            warn!("{} answered {} [request_id: {}]", label, status, request_id);
            return Err(map_http_error(status, Some(&headers), body, request_id));
        }

        Self::ensure_json(&response)?;
        if let Some(length) = response.content_length() {
            self.ensure_size(length as usize, request_id)?;
        }

        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(format!(
                    "response body not received within {:?} [request_id: {}]",
                    timeout, request_id
                ))
            } else {
                ProviderError::Network(format!("Failed to read response body: {} [request_id: {}]", e, request_id))
            }
        })?;
        self.ensure_size(text.len(), request_id)?;

        let value = serde_json::from_str(&text).map_err(|e| {
            error!("Undecodable reply from {} [request_id: {}]: {}", label, request_id, e);
            ProviderError::Protocol(format!("Invalid response format: {} [request_id: {}]", e, request_id))
        })?;

        info!("{} answered {} [request_id: {}]", label, status, request_id);
        Ok(value)
    }
}
