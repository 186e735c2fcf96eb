//! Environment variable interpolation for configuration

use super::error::ConfigError;
use regex::Regex;
use std::env;

const ENV_VAR_PATTERN: &str = r"\$\{([A-Z_][A-Z0-9_]*)\}";

/// Interpolate `${VAR}` references in a configuration string
///
/// Every referenced variable must be set; the first missing one is reported.
pub fn interpolate_env_vars(content: &str) -> Result<String, ConfigError> {
    interpolate_with(content, |name| env::var(name).ok())
}

/// Interpolate `${VAR}` references using a custom lookup
pub fn interpolate_with<F>(content: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let pattern = Regex::new(ENV_VAR_PATTERN).map_err(|e| ConfigError::Invalid {
        message: e.to_string(),
    })?;
    let mut missing: Option<String> = None;

    let result = pattern.replace_all(content, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        match lookup(name) {
            Some(value) => value,
            None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(var) => Err(ConfigError::EnvVarNotFound { var }),
        None => Ok(result.into_owned()),
    }
}
