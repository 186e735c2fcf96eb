//! Configuration for the invocation layer
//!
//! [`LlmConfig`] is read from YAML or JSON, with `${VAR}` references
//! substituted from the process environment before parsing, and validated
//! before it is returned. Credentials can also come from a [`Context`]
//! at invocation time.

mod context;
mod env;
mod error;
mod schema;
mod secrets;
mod validator;

pub use context::Context;
pub use env::{interpolate_env_vars, interpolate_with};
pub use error::{ConfigError, ConfigResult, ValidationError, ValidationErrorKind};
pub use schema::{LlmConfig, ModelPricing};
pub use secrets::SecretString;
pub use validator::ConfigValidator;

use std::fs;
use std::path::Path;

/// Supported config file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Guess the format from the file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "YAML",
            ConfigFormat::Json => "JSON",
        }
    }

    fn parse(&self, content: &str) -> Result<LlmConfig, (Option<usize>, Option<usize>, String)> {
        match self {
            ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| {
                let location = e.location();
                (location.as_ref().map(|l| l.line()), location.map(|l| l.column()), e.to_string())
            }),
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|e| (Some(e.line()), Some(e.column()), e.to_string()))
            }
        }
    }
}

/// Load a configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> ConfigResult<LlmConfig> {
    load(path.as_ref(), ConfigFormat::Yaml)
}

/// Load a configuration from a JSON file
pub fn load_from_json<P: AsRef<Path>>(path: P) -> ConfigResult<LlmConfig> {
    load(path.as_ref(), ConfigFormat::Json)
}

/// Load a configuration, picking the format from the file extension
pub fn load_from_path<P: AsRef<Path>>(path: P) -> ConfigResult<LlmConfig> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat {
        path: path.display().to_string(),
    })?;
    load(path, format)
}

fn load(path: &Path, format: ConfigFormat) -> ConfigResult<LlmConfig> {
    let display = path.display().to_string();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::IoError {
        path: display.clone(),
        source,
    })?;

    let interpolated = env::interpolate_env_vars(&content)?;
    let config = format
        .parse(&interpolated)
        .map_err(|(line, column, message)| ConfigError::ParseError {
            path: display,
            format: format.name(),
            line,
            column,
            message,
        })?;

    ConfigValidator::new().validate(&config)?;
    tracing::debug!("Loaded {} config for {}", format.name(), config.model_name);
    Ok(config)
}
