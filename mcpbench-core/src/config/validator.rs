//! Configuration validation utilities

use std::collections::HashSet;

use regex::Regex;
use tracing::warn;

use super::error::ValidationError;
use super::schema::LlmConfig;
use crate::providers::registry::ModelRef;

/// Configuration validator with cross-field rules
pub struct ConfigValidator {
    /// Pattern for environment variable placeholders left unresolved
    env_var_pattern: Option<Regex>,
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self {
            env_var_pattern: Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").ok(),
        }
    }

    /// Validate a configuration with extended rules
    pub fn validate(&self, config: &LlmConfig) -> Result<(), ValidationError> {
        config.validate()?;

        self.validate_placeholders(config)?;
        self.validate_fallback_chain(config)?;

        Ok(())
    }

    /// Reject placeholders interpolation could not resolve
    fn validate_placeholders(&self, config: &LlmConfig) -> Result<(), ValidationError> {
        let Some(pattern) = &self.env_var_pattern else {
            return Ok(());
        };

        if let Some(api_key) = &config.api_key {
            if pattern.is_match(api_key.expose_secret()) {
                return Err(ValidationError::invalid_format(
                    "api_key",
                    "contains an unresolved environment placeholder",
                ));
            }
        }

        if let Some(base_url) = &config.base_url {
            if pattern.is_match(base_url) {
                return Err(ValidationError::invalid_format(
                    "base_url",
                    "contains an unresolved environment placeholder",
                ));
            }
        }

        Ok(())
    }

    /// Every fallback must name a model; duplicates are legal but logged
    fn validate_fallback_chain(&self, config: &LlmConfig) -> Result<(), ValidationError> {
        let primary = ModelRef::parse(&config.model_name, config.provider);
        let mut seen = HashSet::from([primary.to_string()]);

        for (index, reference) in config.fallback_models.iter().enumerate() {
            if reference.trim().is_empty() {
                return Err(ValidationError::required(format!("fallback_models[{}]", index)));
            }

            let resolved = ModelRef::parse(reference, primary.provider);
            if !seen.insert(resolved.to_string()) {
                warn!(
                    "Fallback model {} repeats an earlier candidate and will be tried again",
                    resolved
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecretString;
    use crate::providers::registry::ProviderId;

    #[test]
    fn test_unresolved_placeholder_rejected() {
        let mut config = LlmConfig::new(ProviderId::OpenAI, "gpt-4o");
        config.api_key = Some(SecretString::new("${OPENAI_API_KEY}"));
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert_eq!(err.field_path, "api_key");
    }

    #[test]
    fn test_empty_fallback_rejected() {
        let config = LlmConfig::new(ProviderId::OpenAI, "gpt-4o").with_fallback_models(["  "]);
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert_eq!(err.field_path, "fallback_models[0]");
    }

    #[test]
    fn test_valid_chain_passes() {
        let config = LlmConfig::new(ProviderId::OpenAI, "gpt-4o")
            .with_fallback_models(["anthropic/claude-3-5-haiku-latest", "gpt-4o-mini"]);
        assert!(ConfigValidator::new().validate(&config).is_ok());
    }
}
