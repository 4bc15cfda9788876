//! Declarative per-provider endpoint table

use super::ProviderId;

/// How the credential is presented to the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <token>`
    Bearer,
    /// `x-api-key: <token>` (Anthropic)
    XApiKey,
    /// `api-key: <token>` (Azure)
    ApiKeyHeader,
    /// `?key=<token>` query parameter (Google)
    KeyInQuery,
}

/// Request/response body dialect spoken by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    OpenAiChat,
    Anthropic,
    Google,
    BedrockConverse,
}

/// Static data describing one provider's endpoint conventions
#[derive(Debug, Clone)]
pub struct ProviderEndpoint {
    pub id: ProviderId,
    /// Default base URL; `None` when it must be derived (Azure) or supplied (custom)
    pub base_url: Option<&'static str>,
    /// Comma-separated credential pool variable
    pub api_key_env: Option<&'static str>,
    /// Auxiliary variables aligned by index with the credential pool
    pub region_env: Option<&'static str>,
    pub resource_env: Option<&'static str>,
    pub deployment_type_env: Option<&'static str>,
    pub api_version_env: Option<&'static str>,
    pub auth: AuthStyle,
    pub wire: WireFormat,
    /// Dropping the connection stops generation (and billing) upstream
    pub supports_cancellation: bool,
    /// Rejects requests that set both temperature and top_p
    pub rejects_temperature_with_top_p: bool,
}

const fn openai_compatible(
    id: ProviderId,
    base_url: &'static str,
    api_key_env: &'static str,
) -> ProviderEndpoint {
    ProviderEndpoint {
        id,
        base_url: Some(base_url),
        api_key_env: Some(api_key_env),
        region_env: None,
        resource_env: None,
        deployment_type_env: None,
        api_version_env: None,
        auth: AuthStyle::Bearer,
        wire: WireFormat::OpenAiChat,
        supports_cancellation: true,
        rejects_temperature_with_top_p: false,
    }
}

static OPENAI: ProviderEndpoint =
    openai_compatible(ProviderId::OpenAI, "https://api.openai.com/v1", "LLM_OPENAI_API_KEY");

static ANTHROPIC: ProviderEndpoint = ProviderEndpoint {
    id: ProviderId::Anthropic,
    base_url: Some("https://api.anthropic.com"),
    api_key_env: Some("LLM_ANTHROPIC_API_KEY"),
    region_env: None,
    resource_env: None,
    deployment_type_env: None,
    api_version_env: None,
    auth: AuthStyle::XApiKey,
    wire: WireFormat::Anthropic,
    supports_cancellation: true,
    rejects_temperature_with_top_p: true,
};

static GOOGLE_AI_STUDIO: ProviderEndpoint = ProviderEndpoint {
    id: ProviderId::GoogleAiStudio,
    base_url: Some("https://generativelanguage.googleapis.com"),
    api_key_env: Some("LLM_GOOGLE_AI_STUDIO_API_KEY"),
    region_env: None,
    resource_env: None,
    deployment_type_env: None,
    api_version_env: None,
    auth: AuthStyle::KeyInQuery,
    wire: WireFormat::Google,
    supports_cancellation: false,
    rejects_temperature_with_top_p: false,
};

static GOOGLE_VERTEX: ProviderEndpoint = ProviderEndpoint {
    id: ProviderId::GoogleVertex,
    base_url: None,
    api_key_env: Some("LLM_GOOGLE_VERTEX_API_KEY"),
    region_env: Some("LLM_GOOGLE_VERTEX_REGION"),
    resource_env: None,
    deployment_type_env: None,
    api_version_env: None,
    auth: AuthStyle::KeyInQuery,
    wire: WireFormat::Google,
    supports_cancellation: false,
    rejects_temperature_with_top_p: false,
};

static AWS_BEDROCK: ProviderEndpoint = ProviderEndpoint {
    id: ProviderId::AwsBedrock,
    base_url: None,
    api_key_env: Some("LLM_AWS_BEDROCK_API_KEY"),
    region_env: Some("LLM_AWS_BEDROCK_REGION"),
    resource_env: None,
    deployment_type_env: None,
    api_version_env: None,
    auth: AuthStyle::Bearer,
    wire: WireFormat::BedrockConverse,
    supports_cancellation: false,
    rejects_temperature_with_top_p: true,
};

static AZURE: ProviderEndpoint = ProviderEndpoint {
    id: ProviderId::Azure,
    base_url: None,
    api_key_env: Some("LLM_AZURE_API_KEY"),
    region_env: None,
    resource_env: Some("LLM_AZURE_RESOURCE"),
    deployment_type_env: Some("LLM_AZURE_DEPLOYMENT_TYPE"),
    api_version_env: Some("LLM_AZURE_API_VERSION"),
    auth: AuthStyle::ApiKeyHeader,
    wire: WireFormat::OpenAiChat,
    supports_cancellation: true,
    rejects_temperature_with_top_p: false,
};

static GROQ: ProviderEndpoint = openai_compatible(
    ProviderId::Groq,
    "https://api.groq.com/openai/v1",
    "LLM_GROQ_API_KEY",
);

static DEEPSEEK: ProviderEndpoint = openai_compatible(
    ProviderId::DeepSeek,
    "https://api.deepseek.com/v1",
    "LLM_DEEPSEEK_API_KEY",
);

static MISTRAL: ProviderEndpoint = openai_compatible(
    ProviderId::Mistral,
    "https://api.mistral.ai/v1",
    "LLM_MISTRAL_API_KEY",
);

static XAI: ProviderEndpoint =
    openai_compatible(ProviderId::XAi, "https://api.x.ai/v1", "LLM_X_AI_API_KEY");

static TOGETHER_AI: ProviderEndpoint = openai_compatible(
    ProviderId::TogetherAi,
    "https://api.together.xyz/v1",
    "LLM_TOGETHER_AI_API_KEY",
);

static CUSTOM: ProviderEndpoint = ProviderEndpoint {
    id: ProviderId::Custom,
    base_url: None,
    api_key_env: None,
    region_env: None,
    resource_env: None,
    deployment_type_env: None,
    api_version_env: None,
    auth: AuthStyle::Bearer,
    wire: WireFormat::OpenAiChat,
    supports_cancellation: false,
    rejects_temperature_with_top_p: false,
};

static LLMGATEWAY: ProviderEndpoint = ProviderEndpoint {
    id: ProviderId::LlmGateway,
    base_url: None,
    api_key_env: None,
    region_env: None,
    resource_env: None,
    deployment_type_env: None,
    api_version_env: None,
    auth: AuthStyle::Bearer,
    wire: WireFormat::OpenAiChat,
    supports_cancellation: false,
    rejects_temperature_with_top_p: false,
};

/// Look up the endpoint entry for a provider
pub fn endpoint(provider: ProviderId) -> &'static ProviderEndpoint {
    match provider {
        ProviderId::OpenAI => &OPENAI,
        ProviderId::Anthropic => &ANTHROPIC,
        ProviderId::GoogleAiStudio => &GOOGLE_AI_STUDIO,
        ProviderId::GoogleVertex => &GOOGLE_VERTEX,
        ProviderId::AwsBedrock => &AWS_BEDROCK,
        ProviderId::Azure => &AZURE,
        ProviderId::Groq => &GROQ,
        ProviderId::DeepSeek => &DEEPSEEK,
        ProviderId::Mistral => &MISTRAL,
        ProviderId::XAi => &XAI,
        ProviderId::TogetherAi => &TOGETHER_AI,
        ProviderId::Custom => &CUSTOM,
        ProviderId::LlmGateway => &LLMGATEWAY,
    }
}
