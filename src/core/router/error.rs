//! Router error types

use crate::core::providers::ProviderError;

/// Routing failures surfaced to the caller
#[derive(Debug, Clone, thiserror::Error)]
pub enum RouterError {
    /// Model is not in the catalog
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Every candidate was filtered out (IAM, stability, pinning)
    #[error("No eligible provider for model: {0}")]
    NoEligibleProviders(String),

    /// Last upstream error, unchanged
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl RouterError {
    pub fn status_code(&self) -> u16 {
        match self {
            RouterError::ModelNotFound(_) => 404,
            RouterError::NoEligibleProviders(_) => 503,
            RouterError::Provider(e) => match e.status() {
                0 => 502,
                status => status,
            },
        }
    }
}
