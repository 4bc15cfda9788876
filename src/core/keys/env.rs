//! Credential environment snapshot

use super::KeyError;
use std::collections::HashMap;

/// Prefix of every variable the gateway reads credentials from
pub const CREDENTIAL_PREFIX: &str = "LLM_";

/// Immutable view of credential-related environment variables
///
/// Captured once at startup (or built explicitly in tests) so resolution
/// never reads the process environment on the request path.
#[derive(Debug, Clone, Default)]
pub struct CredentialEnv {
    vars: HashMap<String, String>,
}

impl CredentialEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the `LLM_*` variables of the current process
    pub fn from_process_env() -> Self {
        Self {
            vars: std::env::vars()
                .filter(|(k, _)| k.starts_with(CREDENTIAL_PREFIX))
                .collect(),
        }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Value of a variable; blank values count as unset
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn require(&self, key: &str) -> Result<&str, KeyError> {
        self.get(key).ok_or_else(|| KeyError::Missing(key.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}
