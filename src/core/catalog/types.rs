//! Catalog data types

use crate::core::providers::ProviderId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Catalog-declared maturity of a model or mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StabilityLevel {
    Stable,
    Beta,
    Unstable,
    Experimental,
}

impl StabilityLevel {
    /// Whether automatic selection may pick a provider at this level
    pub fn is_routable(&self) -> bool {
        matches!(self, StabilityLevel::Stable | StabilityLevel::Beta)
    }
}

/// Sampling parameters a provider-model pair may or may not accept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingParameter {
    Temperature,
    TopP,
    FrequencyPenalty,
    PresencePenalty,
    MaxTokens,
}

impl SamplingParameter {
    pub fn as_str(&self) -> &'static str {
        match self {
            SamplingParameter::Temperature => "temperature",
            SamplingParameter::TopP => "top_p",
            SamplingParameter::FrequencyPenalty => "frequency_penalty",
            SamplingParameter::PresencePenalty => "presence_penalty",
            SamplingParameter::MaxTokens => "max_tokens",
        }
    }
}

/// Capability flags of a provider-model pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub vision: bool,
    #[serde(default)]
    pub tools: bool,
    #[serde(default)]
    pub reasoning: bool,
    #[serde(default)]
    pub json_output: bool,
    /// Accepts `response_format: json_schema`
    #[serde(default)]
    pub json_output_schema: bool,
    /// Served through the "responses" style endpoint instead of chat completions
    #[serde(default)]
    pub responses_api: bool,
}

/// A catalog model on one provider: upstream name, pricing and capabilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderModelMapping {
    pub provider_id: ProviderId,
    /// Provider-specific model name sent upstream
    pub model_name: String,
    /// USD per prompt token
    pub input_price: Decimal,
    /// USD per completion token
    pub output_price: Decimal,
    /// USD per cached prompt token; billed at `input_price` when absent
    #[serde(default)]
    pub cached_input_price: Option<Decimal>,
    /// Flat USD per request
    #[serde(default)]
    pub request_price: Decimal,
    /// Hardcoded catalog discount in [0, 1)
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub context_size: Option<u32>,
    #[serde(default)]
    pub max_output: Option<u32>,
    #[serde(default)]
    pub capabilities: ModelCapabilities,
    #[serde(default)]
    pub stability: Option<StabilityLevel>,
    /// `None` means every sampling parameter is accepted
    #[serde(default)]
    pub supported_parameters: Option<BTreeSet<SamplingParameter>>,
}

impl ProviderModelMapping {
    pub fn new(
        provider_id: ProviderId,
        model_name: impl Into<String>,
        input_price: Decimal,
        output_price: Decimal,
    ) -> Self {
        Self {
            provider_id,
            model_name: model_name.into(),
            input_price,
            output_price,
            cached_input_price: None,
            request_price: Decimal::ZERO,
            discount: Decimal::ZERO,
            context_size: None,
            max_output: None,
            capabilities: ModelCapabilities {
                streaming: true,
                ..ModelCapabilities::default()
            },
            stability: None,
            supported_parameters: None,
        }
    }

    pub fn with_cached_input_price(mut self, price: Decimal) -> Self {
        self.cached_input_price = Some(price);
        self
    }

    pub fn with_request_price(mut self, price: Decimal) -> Self {
        self.request_price = price;
        self
    }

    pub fn with_discount(mut self, discount: Decimal) -> Self {
        self.discount = discount;
        self
    }

    pub fn with_limits(mut self, context_size: u32, max_output: u32) -> Self {
        self.context_size = Some(context_size);
        self.max_output = Some(max_output);
        self
    }

    pub fn with_capabilities(mut self, capabilities: ModelCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_stability(mut self, stability: StabilityLevel) -> Self {
        self.stability = Some(stability);
        self
    }

    pub fn with_supported_parameters(
        mut self,
        parameters: impl IntoIterator<Item = SamplingParameter>,
    ) -> Self {
        self.supported_parameters = Some(parameters.into_iter().collect());
        self
    }

    /// Whether the pair declares support for a sampling parameter
    pub fn supports_parameter(&self, parameter: SamplingParameter) -> bool {
        self.supported_parameters
            .as_ref()
            .map(|set| set.contains(&parameter))
            .unwrap_or(true)
    }
}

/// A catalog model and its ordered provider mappings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub id: String,
    pub family: String,
    #[serde(default)]
    pub free: bool,
    #[serde(default)]
    pub stability: Option<StabilityLevel>,
    pub providers: Vec<ProviderModelMapping>,
}

impl ModelDefinition {
    pub fn new(id: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            family: family.into(),
            free: false,
            stability: None,
            providers: Vec::new(),
        }
    }

    pub fn free(mut self) -> Self {
        self.free = true;
        self
    }

    pub fn with_stability(mut self, stability: StabilityLevel) -> Self {
        self.stability = Some(stability);
        self
    }

    pub fn with_provider(mut self, mapping: ProviderModelMapping) -> Self {
        self.providers.push(mapping);
        self
    }

    /// Mapping-level stability wins over model-level; unset means stable
    pub fn effective_stability(&self, mapping: &ProviderModelMapping) -> StabilityLevel {
        mapping
            .stability
            .or(self.stability)
            .unwrap_or(StabilityLevel::Stable)
    }

    pub fn mapping(&self, provider: ProviderId) -> Option<&ProviderModelMapping> {
        self.providers.iter().find(|m| m.provider_id == provider)
    }
}

/// Providers an API key's IAM rules allow, already evaluated upstream of this core
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedProviders(HashSet<ProviderId>);

impl AllowedProviders {
    pub fn new(providers: impl IntoIterator<Item = ProviderId>) -> Self {
        Self(providers.into_iter().collect())
    }

    pub fn permits(&self, provider: ProviderId) -> bool {
        self.0.contains(&provider)
    }
}
