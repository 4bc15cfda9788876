//! Upstream header construction

use super::ProviderError;
use super::ProviderId;
use super::endpoints::AuthStyle;
use crate::core::catalog::ProviderModelMapping;
use crate::core::types::{ChatRequest, ResponseFormat};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const ANTHROPIC_BETA_INTERLEAVED_THINKING: &str = "interleaved-thinking-2025-05-14";
pub const ANTHROPIC_BETA_STRUCTURED_OUTPUTS: &str = "structured-outputs-2025-11-13";

fn header_value(provider: ProviderId, value: &str) -> Result<HeaderValue, ProviderError> {
    HeaderValue::from_str(value)
        .map_err(|e| ProviderError::configuration(provider, format!("invalid header value: {}", e)))
}

/// Provider beta features the request needs
fn anthropic_betas(request: &ChatRequest, mapping: &ProviderModelMapping) -> Vec<&'static str> {
    let mut betas = Vec::new();
    if request.reasoning_effort.is_some() && mapping.capabilities.reasoning {
        betas.push(ANTHROPIC_BETA_INTERLEAVED_THINKING);
    }
    if matches!(request.response_format, Some(ResponseFormat::JsonSchema { .. })) {
        betas.push(ANTHROPIC_BETA_STRUCTURED_OUTPUTS);
    }
    betas
}

/// Auth plus request-scoped feature headers; content type is always JSON
pub fn build_headers(
    provider: ProviderId,
    token: Option<&str>,
    request: &ChatRequest,
    mapping: &ProviderModelMapping,
) -> Result<HeaderMap, ProviderError> {
    let mut headers = HeaderMap::new();

    if let Some(token) = token {
        match provider.endpoint().auth {
            AuthStyle::Bearer => {
                headers.insert(
                    AUTHORIZATION,
                    header_value(provider, &format!("Bearer {}", token))?,
                );
            }
            AuthStyle::XApiKey => {
                headers.insert(HeaderName::from_static("x-api-key"), header_value(provider, token)?);
            }
            AuthStyle::ApiKeyHeader => {
                headers.insert(HeaderName::from_static("api-key"), header_value(provider, token)?);
            }
            // Carried in the URL
            AuthStyle::KeyInQuery => {}
        }
    }

    if provider == ProviderId::Anthropic {
        headers.insert(
            HeaderName::from_static("anthropic-version"),
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        let betas = anthropic_betas(request, mapping);
        if !betas.is_empty() {
            headers.insert(
                HeaderName::from_static("anthropic-beta"),
                header_value(provider, &betas.join(","))?,
            );
        }
    }

    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}
