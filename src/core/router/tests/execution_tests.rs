//! Retry eligibility tests

use crate::core::providers::{ErrorType, ProviderError, ProviderId};
use crate::core::router::execution::{
    MAX_RETRIES, RetryPolicy, get_error_type, is_retryable_error, should_retry_request,
};

#[test]
fn test_is_retryable_error() {
    for status in [500, 502, 503, 504, 429, 0] {
        assert!(is_retryable_error(status), "{} should be retryable", status);
    }
    for status in [400, 401, 403, 404, 422, 200, 201] {
        assert!(!is_retryable_error(status), "{} should not be retryable", status);
    }
}

#[test]
fn test_get_error_type() {
    assert_eq!(get_error_type(0), ErrorType::NetworkError);
    assert_eq!(get_error_type(429), ErrorType::RateLimited);
    assert_eq!(get_error_type(503), ErrorType::UpstreamError);
    assert_eq!(get_error_type(400), ErrorType::UpstreamError);
    assert_eq!(ErrorType::RateLimited.to_string(), "rate_limited");
}

#[test]
fn test_should_retry_request_happy_path() {
    assert!(should_retry_request(None, false, 503, 0, 2, ProviderId::OpenAI));
    assert!(should_retry_request(None, false, 0, 1, 1, ProviderId::Anthropic));
    assert!(should_retry_request(None, false, 429, 0, 1, ProviderId::Groq));
}

#[test]
fn test_should_retry_request_blockers() {
    let p = ProviderId::OpenAI;
    // pinned provider
    assert!(!should_retry_request(Some(p), false, 503, 0, 2, p));
    // fallback disabled
    assert!(!should_retry_request(None, true, 503, 0, 2, p));
    // non-retryable status
    assert!(!should_retry_request(None, false, 400, 0, 2, p));
    assert!(!should_retry_request(None, false, 401, 0, 2, p));
    // retry budget spent
    assert!(!should_retry_request(None, false, 503, MAX_RETRIES, 2, p));
    // nothing left to try
    assert!(!should_retry_request(None, false, 503, 0, 0, p));
    // no sensible fallback target
    assert!(!should_retry_request(None, false, 503, 0, 2, ProviderId::Custom));
    assert!(!should_retry_request(None, false, 503, 0, 2, ProviderId::LlmGateway));
}

#[test]
fn test_configured_retry_bound() {
    let policy = RetryPolicy::new(5);
    assert!(policy.should_retry_request(None, false, 502, 4, 1, ProviderId::Mistral));
    assert!(!policy.should_retry_request(None, false, 502, 5, 1, ProviderId::Mistral));
    assert!(!RetryPolicy::new(0).should_retry_request(None, false, 502, 0, 3, ProviderId::Mistral));
}

#[test]
fn test_credential_error_may_fall_back() {
    let policy = RetryPolicy::default();
    assert!(policy.should_retry_after_credential_error(None, false, 0, 1, ProviderId::OpenAI));
    assert!(!policy.should_retry_after_credential_error(Some(ProviderId::OpenAI), false, 0, 1, ProviderId::OpenAI));
    assert!(!policy.should_retry_after_credential_error(None, false, 0, 0, ProviderId::OpenAI));
}

#[test]
fn test_provider_error_retryability() {
    let p = ProviderId::DeepSeek;
    assert!(ProviderError::from_status(p, 502, "x").is_retryable());
    assert!(ProviderError::from_status(p, 0, "x").is_retryable());
    assert!(!ProviderError::from_status(p, 422, "x").is_retryable());
    assert!(!ProviderError::configuration(p, "missing key").is_retryable());
    assert!(!ProviderError::Cancelled { provider: p }.is_retryable());
}
