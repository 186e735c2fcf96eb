//! Configuration errors

use std::fmt;
use thiserror::Error;

/// Failure to load or accept an [`LlmConfig`](super::LlmConfig)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{format} parse error in '{path}' at {}:{}: {message}",
            .line.unwrap_or(0), .column.unwrap_or(0))]
    ParseError {
        path: String,
        format: &'static str,
        line: Option<usize>,
        column: Option<usize>,
        message: String,
    },

    #[error(transparent)]
    ValidationError(#[from] ValidationError),

    #[error("environment variable '{var}' referenced by the config is not set")]
    EnvVarNotFound { var: String },

    #[error("unsupported config file '{path}': expected .yaml, .yml or .json")]
    UnsupportedFormat { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

/// A rejected field, addressed by its dotted path
/// (`pricing.gpt-4o.cost_per_1k_input`, `fallback_models[2]`)
#[derive(Debug, Error)]
pub struct ValidationError {
    pub field_path: String,
    pub kind: ValidationErrorKind,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid '{}': {}", self.field_path, self.kind)
    }
}

#[derive(Debug, Error)]
pub enum ValidationErrorKind {
    #[error("value is required")]
    Missing,

    #[error("{0}")]
    OutOfRange(String),

    #[error("{0}")]
    InvalidFormat(String),

    #[error("not a valid URL ({0})")]
    InvalidUrl(String),
}

impl ValidationError {
    pub fn new(field_path: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            field_path: field_path.into(),
            kind,
        }
    }

    pub fn required(field_path: impl Into<String>) -> Self {
        Self::new(field_path, ValidationErrorKind::Missing)
    }

    pub fn out_of_range(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field_path, ValidationErrorKind::OutOfRange(message.into()))
    }

    pub fn invalid_format(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field_path, ValidationErrorKind::InvalidFormat(message.into()))
    }

    pub fn invalid_url(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field_path, ValidationErrorKind::InvalidUrl(message.into()))
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
