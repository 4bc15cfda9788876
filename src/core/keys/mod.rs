//! Pooled credential rotation and health tracking
//!
//! In credits mode one environment variable may hold several comma-separated
//! credentials. [`KeyPool`] spreads requests across them and steers away from
//! keys that keep failing.

pub mod env;
pub mod pool;

pub use env::CredentialEnv;
pub use pool::{
    KeyHealthConfig, KeyHealthSnapshot, KeyPool, KeyState, RoundRobinValue, get_nth_value,
    parse_comma_separated_env,
};

/// Credential pool errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("Environment variable {0} is not set")]
    Missing(String),

    #[error("Environment variable {0} holds no values")]
    Empty(String),

    #[error("No value available and no default supplied")]
    NoValue,
}
