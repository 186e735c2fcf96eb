//! Credential wrapper
//!
//! API keys are held in [`SecretString`], whose Debug and Display output is
//! always `[REDACTED]`. Serialization is transparent so configs round-trip.

use serde::{Deserialize, Serialize};
use std::fmt;

const REDACTED: &str = "[REDACTED]";

/// Key prefixes issued by providers, longest first
const KEY_PREFIXES: &[&str] = &["sk-proj-", "sk-ant-", "sk-or-", "sk-", "xai-", "AIza"];

/// An API key or other credential
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw credential, for building request headers
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Recognizable but unusable form: known provider prefix plus last four
    /// characters, for telling keys apart in diagnostics
    pub fn partial_redact(&self) -> String {
        let value = self.0.as_str();
        if value.is_empty() {
            return "[EMPTY]".to_string();
        }
        if value.len() <= 8 || !value.is_ascii() {
            return REDACTED.to_string();
        }

        let tail = &value[value.len() - 4..];
        match KEY_PREFIXES.iter().find(|prefix| value.starts_with(*prefix)) {
            Some(prefix) => format!("{}...{}", prefix, tail),
            None => format!("...{}", tail),
        }
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
