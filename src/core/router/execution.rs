//! Retry eligibility rules
//!
//! Pure decision functions of the attempt loop, kept free of I/O.

use crate::config::RouterSettings;
use crate::core::providers::{ErrorType, ProviderId};

/// Default bound on retries after the first attempt
pub const MAX_RETRIES: u32 = 2;

/// 5xx, 429 and network failures (status 0) may succeed elsewhere; other
/// 4xx responses mean the request itself is invalid
pub fn is_retryable_error(status: u16) -> bool {
    status == 0 || status == 429 || (500..=599).contains(&status)
}

/// Coarse classification for metrics and logs
pub fn get_error_type(status: u16) -> ErrorType {
    match status {
        0 => ErrorType::NetworkError,
        429 => ErrorType::RateLimited,
        _ => ErrorType::UpstreamError,
    }
}

/// Whether a failed attempt should fall back to another provider, with the default bound
pub fn should_retry_request(
    requested_provider: Option<ProviderId>,
    no_fallback: bool,
    status: u16,
    retry_count: u32,
    remaining_providers: usize,
    used_provider: ProviderId,
) -> bool {
    RetryPolicy::default().should_retry_request(
        requested_provider,
        no_fallback,
        status,
        retry_count,
        remaining_providers,
        used_provider,
    )
}

/// Retry bound taken from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
        }
    }
}

impl From<&RouterSettings> for RetryPolicy {
    fn from(settings: &RouterSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Every fallback condition except the status check
    pub fn fallback_allowed(
        &self,
        requested_provider: Option<ProviderId>,
        no_fallback: bool,
        retry_count: u32,
        remaining_providers: usize,
        used_provider: ProviderId,
    ) -> bool {
        requested_provider.is_none()
            && !no_fallback
            && retry_count < self.max_retries
            && remaining_providers > 0
            && !used_provider.is_fallback_exempt()
    }

    pub fn should_retry_request(
        &self,
        requested_provider: Option<ProviderId>,
        no_fallback: bool,
        status: u16,
        retry_count: u32,
        remaining_providers: usize,
        used_provider: ProviderId,
    ) -> bool {
        is_retryable_error(status)
            && self.fallback_allowed(
                requested_provider,
                no_fallback,
                retry_count,
                remaining_providers,
                used_provider,
            )
    }

    /// A 401 is not retryable as a status, but the credential (not the
    /// request) is at fault, so another provider may still be tried
    pub fn should_retry_after_credential_error(
        &self,
        requested_provider: Option<ProviderId>,
        no_fallback: bool,
        retry_count: u32,
        remaining_providers: usize,
        used_provider: ProviderId,
    ) -> bool {
        self.fallback_allowed(
            requested_provider,
            no_fallback,
            retry_count,
            remaining_providers,
            used_provider,
        )
    }
}
