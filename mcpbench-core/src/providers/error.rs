//! Provider error types and handling

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors that can occur when interacting with LLM providers
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// The caller handed us a conversation that cannot be sent anywhere
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Credentials were rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    /// The request did not complete in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Provider returned a 5xx
    #[error("Server error ({status_code}): {message}")]
    ServerError { status_code: u16, message: String },

    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// The provider answered with something we could not interpret
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The invocation is misconfigured
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// How the retry engine and the fallback chain treat an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Worth another attempt against the same candidate
    Retryable,
    /// Give up on this candidate and move to the next one
    Fatal,
    /// The caller's fault; surfaced immediately
    Caller,
}

/// Classify an error
pub fn classify(error: &ProviderError) -> ErrorClass {
    match error {
        ProviderError::RateLimited { .. }
        | ProviderError::Timeout(_)
        | ProviderError::ServerError { .. }
        | ProviderError::Network(_) => ErrorClass::Retryable,
        ProviderError::Unauthorized(_) | ProviderError::Protocol(_) => ErrorClass::Fatal,
        ProviderError::MalformedInput(_) | ProviderError::Configuration(_) => ErrorClass::Caller,
    }
}

impl ProviderError {
    /// Class of this error
    pub fn class(&self) -> ErrorClass {
        classify(self)
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }

    /// Provider-advertised wait before the next attempt, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Short stable name, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::MalformedInput(_) => "malformed_input",
            ProviderError::Unauthorized(_) => "unauthorized",
            ProviderError::RateLimited { .. } => "rate_limited",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::ServerError { .. } => "server_error",
            ProviderError::Network(_) => "network",
            ProviderError::Protocol(_) => "protocol",
            ProviderError::Configuration(_) => "configuration",
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Protocol(err.to_string())
    }
}

/// Errors surfaced to the caller of an invocation instead of an outcome
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvocationError {
    /// The conversation or tool definitions are structurally invalid
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// The invocation cannot be attempted as configured
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<ProviderError> for InvocationError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::MalformedInput(message) => InvocationError::MalformedInput(message),
            ProviderError::Configuration(message) => InvocationError::Configuration(message),
            other => InvocationError::Configuration(other.to_string()),
        }
    }
}

impl From<ConfigError> for InvocationError {
    fn from(err: ConfigError) -> Self {
        InvocationError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_table() {
        let cases = [
            (ProviderError::MalformedInput("x".into()), ErrorClass::Caller),
            (ProviderError::Configuration("x".into()), ErrorClass::Caller),
            (ProviderError::Unauthorized("x".into()), ErrorClass::Fatal),
            (ProviderError::Protocol("x".into()), ErrorClass::Fatal),
            (ProviderError::Timeout("x".into()), ErrorClass::Retryable),
            (ProviderError::Network("x".into()), ErrorClass::Retryable),
            (
                ProviderError::ServerError {
                    status_code: 502,
                    message: "x".into(),
                },
                ErrorClass::Retryable,
            ),
            (
                ProviderError::RateLimited {
                    message: "x".into(),
                    retry_after: None,
                },
                ErrorClass::Retryable,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(classify(&error), expected, "{}", error.kind());
        }
    }

    #[test]
    fn test_retry_after_only_on_rate_limit() {
        let limited = ProviderError::RateLimited {
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(ProviderError::Timeout("t".into()).retry_after(), None);
    }

    #[test]
    fn test_invocation_error_conversion() {
        let err: InvocationError = ProviderError::MalformedInput("bad".into()).into();
        assert_eq!(err, InvocationError::MalformedInput("bad".into()));
    }
}
