//! Sampling parameter filtering

use super::endpoints::ProviderEndpoint;
use crate::core::catalog::{ProviderModelMapping, SamplingParameter};
use crate::core::types::ChatRequest;
use serde::Serialize;
use tracing::debug;

/// Caller sampling controls after provider-specific filtering
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SamplingParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl From<&ChatRequest> for SamplingParams {
    fn from(request: &ChatRequest) -> Self {
        Self {
            temperature: request.temperature,
            top_p: request.top_p,
            frequency_penalty: request.frequency_penalty,
            presence_penalty: request.presence_penalty,
            max_tokens: request.max_tokens,
        }
    }
}

impl SamplingParams {
    fn is_set(&self, parameter: SamplingParameter) -> bool {
        match parameter {
            SamplingParameter::Temperature => self.temperature.is_some(),
            SamplingParameter::TopP => self.top_p.is_some(),
            SamplingParameter::FrequencyPenalty => self.frequency_penalty.is_some(),
            SamplingParameter::PresencePenalty => self.presence_penalty.is_some(),
            SamplingParameter::MaxTokens => self.max_tokens.is_some(),
        }
    }

    fn clear(&mut self, parameter: SamplingParameter) {
        match parameter {
            SamplingParameter::Temperature => self.temperature = None,
            SamplingParameter::TopP => self.top_p = None,
            SamplingParameter::FrequencyPenalty => self.frequency_penalty = None,
            SamplingParameter::PresencePenalty => self.presence_penalty = None,
            SamplingParameter::MaxTokens => self.max_tokens = None,
        }
    }
}

const ALL_PARAMETERS: [SamplingParameter; 5] = [
    SamplingParameter::Temperature,
    SamplingParameter::TopP,
    SamplingParameter::FrequencyPenalty,
    SamplingParameter::PresencePenalty,
    SamplingParameter::MaxTokens,
];

/// Drop parameters the provider-model pair does not accept
pub fn strip_parameters(
    mut params: SamplingParams,
    mapping: &ProviderModelMapping,
    endpoint: &ProviderEndpoint,
) -> SamplingParams {
    for parameter in ALL_PARAMETERS {
        if params.is_set(parameter) && !mapping.supports_parameter(parameter) {
            debug!(
                provider = %mapping.provider_id,
                model = %mapping.model_name,
                parameter = parameter.as_str(),
                "dropping unsupported parameter"
            );
            params.clear(parameter);
        }
    }

    if endpoint.rejects_temperature_with_top_p
        && params.temperature.is_some()
        && params.top_p.is_some()
    {
        params.top_p = None;
    }

    params.max_tokens = clamp_max_tokens(params.max_tokens, mapping);
    params
}

/// Clamp to the model's max output; never raises or invents a value
pub fn clamp_max_tokens(max_tokens: Option<u32>, mapping: &ProviderModelMapping) -> Option<u32> {
    match (max_tokens, mapping.max_output) {
        (Some(requested), Some(limit)) if requested > limit => {
            debug!(requested, limit, model = %mapping.model_name, "clamping max_tokens");
            Some(limit)
        }
        (requested, _) => requested,
    }
}
