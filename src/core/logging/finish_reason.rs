//! Provider finish reasons normalized to one vocabulary

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::providers::{ProviderError, ProviderId, TokenSource, WireFormat};

/// Provider-agnostic completion status persisted with every log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnifiedFinishReason {
    Completed,
    LengthLimit,
    ContentFilter,
    ToolCalls,
    GatewayError,
    UpstreamError,
    ClientError,
    Canceled,
    Unknown,
}

impl UnifiedFinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::LengthLimit => "length_limit",
            Self::ContentFilter => "content_filter",
            Self::ToolCalls => "tool_calls",
            Self::GatewayError => "gateway_error",
            Self::UpstreamError => "upstream_error",
            Self::ClientError => "client_error",
            Self::Canceled => "canceled",
            Self::Unknown => "unknown",
        }
    }

    /// Terminal outcome of a failed request
    ///
    /// A rejected credential is the caller's problem when they supplied it
    /// and the gateway's when it came from the pool.
    pub fn from_error(error: &ProviderError, token_source: Option<TokenSource>) -> Self {
        match error {
            ProviderError::Configuration { .. } => Self::GatewayError,
            ProviderError::Cancelled { .. } => Self::Canceled,
            ProviderError::ClientError { .. } => Self::ClientError,
            ProviderError::PermanentCredential { .. } => match token_source {
                Some(TokenSource::Organization) => Self::ClientError,
                _ => Self::GatewayError,
            },
            ProviderError::RateLimited { .. }
            | ProviderError::Upstream { .. }
            | ProviderError::Network { .. }
            | ProviderError::ResponseParsing { .. } => Self::UpstreamError,
        }
    }
}

impl std::fmt::Display for UnifiedFinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons we see but deliberately leave as `Unknown`
const INTENTIONALLY_UNMAPPED: &[&str] = &[
    // Anthropic long-running turn paused for continuation
    "pause_turn",
    "FINISH_REASON_UNSPECIFIED",
    "OTHER",
    "LANGUAGE",
    "MALFORMED_FUNCTION_CALL",
];

fn map_openai(raw: &str) -> Option<UnifiedFinishReason> {
    use UnifiedFinishReason::*;
    Some(match raw {
        "stop" | "completed" => Completed,
        "length" | "max_output_tokens" | "incomplete" => LengthLimit,
        "content_filter" => ContentFilter,
        "tool_calls" | "function_call" => ToolCalls,
        _ => return None,
    })
}

fn map_anthropic(raw: &str) -> Option<UnifiedFinishReason> {
    use UnifiedFinishReason::*;
    Some(match raw {
        "end_turn" | "stop_sequence" => Completed,
        "max_tokens" | "model_context_window_exceeded" => LengthLimit,
        "tool_use" => ToolCalls,
        "refusal" => ContentFilter,
        _ => return None,
    })
}

fn map_google(raw: &str) -> Option<UnifiedFinishReason> {
    use UnifiedFinishReason::*;
    Some(match raw {
        "STOP" => Completed,
        "MAX_TOKENS" => LengthLimit,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" | "IMAGE_SAFETY" => {
            ContentFilter
        }
        _ => return None,
    })
}

fn map_bedrock(raw: &str) -> Option<UnifiedFinishReason> {
    use UnifiedFinishReason::*;
    Some(match raw {
        "end_turn" | "stop_sequence" => Completed,
        "max_tokens" => LengthLimit,
        "tool_use" => ToolCalls,
        "guardrail_intervened" | "content_filtered" => ContentFilter,
        _ => return None,
    })
}

/// Normalize a provider's finish reason, taking the HTTP outcome into account
///
/// Error statuses win over whatever reason the body carried. Unrecognized
/// reasons become `Unknown` and are logged so gaps in the mapping surface.
pub fn unify_finish_reason(
    provider: ProviderId,
    raw: Option<&str>,
    status: u16,
) -> UnifiedFinishReason {
    match status {
        499 => return UnifiedFinishReason::Canceled,
        0 | 429 | 500..=599 => return UnifiedFinishReason::UpstreamError,
        400..=498 => return UnifiedFinishReason::ClientError,
        _ => {}
    }

    let Some(raw) = raw else {
        return UnifiedFinishReason::Unknown;
    };
    if raw == "canceled" {
        return UnifiedFinishReason::Canceled;
    }

    let mapped = match provider.endpoint().wire {
        WireFormat::OpenAiChat => map_openai(raw),
        WireFormat::Anthropic => map_anthropic(raw),
        WireFormat::Google => map_google(raw),
        WireFormat::BedrockConverse => map_bedrock(raw),
    };

    mapped.unwrap_or_else(|| {
        if !INTENTIONALLY_UNMAPPED.contains(&raw) {
            warn!(provider = %provider, finish_reason = raw, "unmapped finish reason");
        }
        UnifiedFinishReason::Unknown
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use UnifiedFinishReason::*;

    #[test]
    fn test_provider_vocabularies() {
        let cases = [
            (ProviderId::OpenAI, "stop", Completed),
            (ProviderId::OpenAI, "length", LengthLimit),
            (ProviderId::OpenAI, "tool_calls", ToolCalls),
            (ProviderId::Azure, "content_filter", ContentFilter),
            (ProviderId::OpenAI, "max_output_tokens", LengthLimit),
            (ProviderId::Groq, "stop", Completed),
            (ProviderId::Anthropic, "end_turn", Completed),
            (ProviderId::Anthropic, "max_tokens", LengthLimit),
            (ProviderId::Anthropic, "tool_use", ToolCalls),
            (ProviderId::GoogleAiStudio, "STOP", Completed),
            (ProviderId::GoogleVertex, "SAFETY", ContentFilter),
            (ProviderId::AwsBedrock, "guardrail_intervened", ContentFilter),
            (ProviderId::AwsBedrock, "max_tokens", LengthLimit),
        ];
        for (provider, raw, expected) in cases {
            assert_eq!(unify_finish_reason(provider, Some(raw), 200), expected, "{} {}", provider, raw);
        }
    }

    #[test]
    fn test_status_overrides_reason() {
        assert_eq!(unify_finish_reason(ProviderId::OpenAI, Some("stop"), 503), UpstreamError);
        assert_eq!(unify_finish_reason(ProviderId::OpenAI, None, 0), UpstreamError);
        assert_eq!(unify_finish_reason(ProviderId::OpenAI, None, 429), UpstreamError);
        assert_eq!(unify_finish_reason(ProviderId::OpenAI, None, 400), ClientError);
        assert_eq!(unify_finish_reason(ProviderId::OpenAI, None, 499), Canceled);
    }

    #[test]
    fn test_unmapped_and_missing_are_unknown() {
        assert_eq!(unify_finish_reason(ProviderId::Anthropic, Some("pause_turn"), 200), Unknown);
        assert_eq!(
            unify_finish_reason(ProviderId::GoogleAiStudio, Some("FINISH_REASON_UNSPECIFIED"), 200),
            Unknown
        );
        assert_eq!(unify_finish_reason(ProviderId::OpenAI, Some("brand_new"), 200), Unknown);
        assert_eq!(unify_finish_reason(ProviderId::OpenAI, None, 200), Unknown);
    }

    #[test]
    fn test_from_error() {
        let p = ProviderId::OpenAI;
        assert_eq!(
            UnifiedFinishReason::from_error(&ProviderError::configuration(p, "missing key"), None),
            GatewayError
        );
        assert_eq!(
            UnifiedFinishReason::from_error(&ProviderError::from_status(p, 502, "bad"), None),
            UpstreamError
        );
        let denied = ProviderError::from_status(p, 401, "denied");
        assert_eq!(
            UnifiedFinishReason::from_error(&denied, Some(TokenSource::Organization)),
            ClientError
        );
        assert_eq!(UnifiedFinishReason::from_error(&denied, Some(TokenSource::Pool)), GatewayError);
        assert_eq!(
            UnifiedFinishReason::from_error(&ProviderError::Cancelled { provider: p }, None),
            Canceled
        );
    }
}
