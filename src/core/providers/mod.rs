//! Upstream providers
//!
//! Providers are a closed enum. Simple differences (base URL, auth header,
//! env var names) live in the declarative [`endpoints`] table; request shaping
//! that differs per wire format lives in [`body`].

pub mod body;
pub mod context;
pub mod endpoints;
pub mod headers;
pub mod params;
pub mod streaming;
pub mod transport;
pub mod unified_provider;

pub use body::{CompletionPayload, UpstreamUsage};
pub use context::{
    OrganizationKey, ProjectContext, ProjectMode, RequestContextResolver, ResolvedToken,
    TokenSource, UpstreamRequest, UrlOptions,
};
pub use endpoints::{AuthStyle, ProviderEndpoint, WireFormat};
pub use params::SamplingParams;
pub use transport::{ReqwestTransport, UpstreamResponse, UpstreamTransport};
pub use unified_provider::{ErrorType, ProviderError};

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Provider identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderId {
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "google-ai-studio")]
    GoogleAiStudio,
    #[serde(rename = "google-vertex")]
    GoogleVertex,
    #[serde(rename = "aws-bedrock")]
    AwsBedrock,
    #[serde(rename = "azure")]
    Azure,
    #[serde(rename = "groq")]
    Groq,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "mistral")]
    Mistral,
    #[serde(rename = "xai")]
    XAi,
    #[serde(rename = "together.ai")]
    TogetherAi,
    /// Organization-defined OpenAI-compatible endpoint
    #[serde(rename = "custom")]
    Custom,
    /// Meta-provider that stands for "let the gateway choose"
    #[serde(rename = "llmgateway")]
    LlmGateway,
}

impl ProviderId {
    pub const ALL: [ProviderId; 13] = [
        ProviderId::OpenAI,
        ProviderId::Anthropic,
        ProviderId::GoogleAiStudio,
        ProviderId::GoogleVertex,
        ProviderId::AwsBedrock,
        ProviderId::Azure,
        ProviderId::Groq,
        ProviderId::DeepSeek,
        ProviderId::Mistral,
        ProviderId::XAi,
        ProviderId::TogetherAi,
        ProviderId::Custom,
        ProviderId::LlmGateway,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenAI => "openai",
            ProviderId::Anthropic => "anthropic",
            ProviderId::GoogleAiStudio => "google-ai-studio",
            ProviderId::GoogleVertex => "google-vertex",
            ProviderId::AwsBedrock => "aws-bedrock",
            ProviderId::Azure => "azure",
            ProviderId::Groq => "groq",
            ProviderId::DeepSeek => "deepseek",
            ProviderId::Mistral => "mistral",
            ProviderId::XAi => "xai",
            ProviderId::TogetherAi => "together.ai",
            ProviderId::Custom => "custom",
            ProviderId::LlmGateway => "llmgateway",
        }
    }

    /// Declarative endpoint data for this provider
    pub fn endpoint(&self) -> &'static ProviderEndpoint {
        endpoints::endpoint(*self)
    }

    /// Providers that have no sensible fallback target
    pub fn is_fallback_exempt(&self) -> bool {
        matches!(self, ProviderId::Custom | ProviderId::LlmGateway)
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        ProviderId::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| format!("Unknown provider: {}", s))
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
