//! Error types for the gateway core

use crate::core::providers::{ProviderError, ProviderId};
use crate::core::router::RouterError;
use thiserror::Error;

/// Result type alias for the gateway core
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Main error type for the gateway core
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration file or value errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing credential or base URL for a provider. Surfaced immediately, never retried.
    #[error("Configuration error for {provider}: {message}")]
    Configuration {
        provider: ProviderId,
        message: String,
    },

    /// Upstream provider errors
    #[error("Provider error: {0}")]
    Provider(ProviderError),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown model
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// No provider survived filtering for a model
    #[error("No providers available: {0}")]
    NoProvidersAvailable(String),

    /// Log or discount storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ProviderError> for GatewayError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::Configuration { provider, message } => {
                GatewayError::Configuration { provider, message }
            }
            other => GatewayError::Provider(other),
        }
    }
}

impl From<RouterError> for GatewayError {
    fn from(error: RouterError) -> Self {
        match error {
            RouterError::ModelNotFound(model) => GatewayError::ModelNotFound(model),
            RouterError::NoEligibleProviders(model) => GatewayError::NoProvidersAvailable(model),
            RouterError::Provider(e) => e.into(),
        }
    }
}

impl GatewayError {
    /// HTTP status an outer layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Provider(err) => match err.status() {
                0 => 502,
                status => status,
            },
            GatewayError::Validation(_) => 400,
            GatewayError::ModelNotFound(_) => 404,
            GatewayError::NoProvidersAvailable(_) => 503,
            _ => 500,
        }
    }
}
