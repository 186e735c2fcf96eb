//! HTTP client module for making API requests to LLM providers
//!
//! This module implements the HTTP layer, handling:
//! - Connection pooling and client management
//! - Error mapping and retry hints
//! - Request ID generation and correlation

pub mod client;
pub mod error;

pub use client::HttpClient;
pub use error::{map_http_error, parse_retry_after};

use crate::providers::error::ProviderError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// A JSON POST to a provider endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Full endpoint URL
    pub url: String,

    /// Extra headers (authentication, versioning)
    pub headers: HashMap<String, String>,

    /// JSON body
    pub body: Value,
}

/// Options for an HTTP request
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Unique request ID for correlation
    pub request_id: Uuid,

    /// Request timeout
    pub timeout: Duration,

    /// Optional label used in logs (usually `provider/model`)
    pub label: Option<String>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            timeout: Duration::from_secs(60),
            label: None,
        }
    }
}

impl RequestOptions {
    /// Create new request options with a generated request ID
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout for this request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the label used in logs
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Trait for HTTP executors
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    /// POST a JSON body and return the decoded JSON reply
    async fn execute_json(
        &self,
        request: HttpRequest,
        options: RequestOptions,
    ) -> Result<Value, ProviderError>;
}
