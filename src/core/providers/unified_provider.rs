//! Unified Provider Error Handling
//!
//! Single error type for every upstream failure, shared by all providers.
//!
//! | Variant | Meaning | Status | Retryable |
//! |------|------|------------|--------|
//! | Configuration | Missing credential / base URL | - | No |
//! | ClientError | Request rejected as invalid | 4xx | No |
//! | PermanentCredential | Credential rejected | 401 | Key blacklisted, another key/provider may be tried |
//! | RateLimited | Rate limit exceeded | 429 | Yes |
//! | Upstream | Provider failure | 5xx | Yes |
//! | Network | No response at all | 0 | Yes |
//! | Cancelled | Client went away | - | No |
//! | ResponseParsing | 2xx with an unusable body | 502 | Yes |

use super::ProviderId;
use serde::{Deserialize, Serialize};

/// Unified provider error type - single error for all providers
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("Configuration error for {provider}: {message}")]
    Configuration {
        provider: ProviderId,
        message: String,
    },

    #[error("Client error from {provider} (status {status}): {message}")]
    ClientError {
        provider: ProviderId,
        status: u16,
        message: String,
    },

    #[error("Credential rejected by {provider}: {message}")]
    PermanentCredential {
        provider: ProviderId,
        message: String,
    },

    #[error("Rate limit exceeded for {provider}: {message}")]
    RateLimited {
        provider: ProviderId,
        message: String,
        retry_after: Option<u64>,
    },

    #[error("Upstream error from {provider} (status {status}): {message}")]
    Upstream {
        provider: ProviderId,
        status: u16,
        message: String,
    },

    #[error("Network error for {provider}: {message}")]
    Network {
        provider: ProviderId,
        message: String,
    },

    #[error("Request to {provider} was cancelled by the client")]
    Cancelled { provider: ProviderId },

    #[error("Failed to parse {provider} response: {message}")]
    ResponseParsing {
        provider: ProviderId,
        message: String,
    },
}

/// Coarse error classification recorded in metrics and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    NetworkError,
    RateLimited,
    UpstreamError,
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorType::NetworkError => write!(f, "network_error"),
            ErrorType::RateLimited => write!(f, "rate_limited"),
            ErrorType::UpstreamError => write!(f, "upstream_error"),
        }
    }
}

impl ProviderError {
    /// Classify an upstream HTTP status (0 = no response) into an error
    pub fn from_status(provider: ProviderId, status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            0 => Self::Network { provider, message },
            401 => Self::PermanentCredential { provider, message },
            429 => Self::RateLimited {
                provider,
                message,
                retry_after: None,
            },
            500..=599 => Self::Upstream {
                provider,
                status,
                message,
            },
            _ => Self::ClientError {
                provider,
                status,
                message,
            },
        }
    }

    /// Create configuration error
    pub fn configuration(provider: ProviderId, message: impl Into<String>) -> Self {
        Self::Configuration {
            provider,
            message: message.into(),
        }
    }

    /// Create network error
    pub fn network(provider: ProviderId, message: impl Into<String>) -> Self {
        Self::Network {
            provider,
            message: message.into(),
        }
    }

    /// Create response parsing error
    pub fn response_parsing(provider: ProviderId, message: impl Into<String>) -> Self {
        Self::ResponseParsing {
            provider,
            message: message.into(),
        }
    }

    /// Attach a `Retry-After` hint to a rate limit error
    pub fn with_retry_after(self, seconds: Option<u64>) -> Self {
        match self {
            Self::RateLimited {
                provider, message, ..
            } => Self::RateLimited {
                provider,
                message,
                retry_after: seconds,
            },
            other => other,
        }
    }

    /// Provider that produced the error
    pub fn provider(&self) -> ProviderId {
        match self {
            Self::Configuration { provider, .. }
            | Self::ClientError { provider, .. }
            | Self::PermanentCredential { provider, .. }
            | Self::RateLimited { provider, .. }
            | Self::Upstream { provider, .. }
            | Self::Network { provider, .. }
            | Self::Cancelled { provider }
            | Self::ResponseParsing { provider, .. } => *provider,
        }
    }

    /// Upstream status the error corresponds to; 0 for network failures
    pub fn status(&self) -> u16 {
        match self {
            Self::Configuration { .. } => 500,
            Self::ClientError { status, .. } | Self::Upstream { status, .. } => *status,
            Self::PermanentCredential { .. } => 401,
            Self::RateLimited { .. } => 429,
            Self::Network { .. } => 0,
            Self::Cancelled { .. } => 499,
            Self::ResponseParsing { .. } => 502,
        }
    }

    /// Whether the failure is specific to one credential rather than the request
    pub fn is_credential_failure(&self) -> bool {
        matches!(self, Self::PermanentCredential { .. })
    }

    /// Whether the outcome says something about the key that was used.
    /// Malformed requests and unusable bodies do not.
    pub fn affects_key_health(&self) -> bool {
        matches!(
            self,
            Self::PermanentCredential { .. }
                | Self::RateLimited { .. }
                | Self::Upstream { .. }
                | Self::Network { .. }
        )
    }

    /// Whether another attempt may succeed where this one failed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Configuration { .. } | Self::Cancelled { .. } => false,
            other => crate::core::router::is_retryable_error(other.status()),
        }
    }

    /// Suggested delay before retrying, in seconds
    pub fn retry_delay(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Classification for metrics and logs
    pub fn error_type(&self) -> ErrorType {
        crate::core::router::get_error_type(self.status())
    }
}
