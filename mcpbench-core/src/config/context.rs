//! Per-invocation context holding environment overrides

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Environment seen by an invoker
///
/// Values set here take precedence over the process environment. An isolated
/// context never falls back to the process environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Environment overrides
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Whether lookups fall through to the process environment
    #[serde(default = "default_true")]
    pub inherit_process_env: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Context {
    fn default() -> Self {
        Self {
            env: HashMap::new(),
            inherit_process_env: true,
        }
    }
}

impl Context {
    /// Context with overrides on top of the process environment
    pub fn new(env: HashMap<String, String>) -> Self {
        Self {
            env,
            inherit_process_env: true,
        }
    }

    /// Context that sees only the given variables
    pub fn isolated(env: HashMap<String, String>) -> Self {
        Self {
            env,
            inherit_process_env: false,
        }
    }

    /// Set one variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Look up a variable; empty values count as unset
    pub fn get_env(&self, key: &str) -> Option<String> {
        if let Some(value) = self.env.get(key).filter(|v| !v.is_empty()) {
            return Some(value.clone());
        }
        if self.inherit_process_env {
            return std::env::var(key).ok().filter(|v| !v.is_empty());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_takes_precedence() {
        let ctx = Context::isolated(HashMap::new()).with_env("MCPBENCH_TEST_KEY", "from-context");
        assert_eq!(ctx.get_env("MCPBENCH_TEST_KEY").as_deref(), Some("from-context"));
    }

    #[test]
    fn test_isolated_context_ignores_process_env() {
        let ctx = Context::isolated(HashMap::new());
        assert_eq!(ctx.get_env("PATH"), None);
    }

    #[test]
    fn test_empty_value_is_unset() {
        let ctx = Context::isolated(HashMap::new()).with_env("K", "");
        assert_eq!(ctx.get_env("K"), None);
    }
}
