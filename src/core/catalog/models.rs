//! Built-in model table

use super::types::{
    ModelCapabilities, ModelDefinition, ProviderModelMapping, SamplingParameter, StabilityLevel,
};
use crate::core::providers::ProviderId;
use rust_decimal_macros::dec;

fn chat_capabilities(tools: bool, vision: bool, json_output: bool) -> ModelCapabilities {
    ModelCapabilities {
        streaming: true,
        vision,
        tools,
        json_output,
        ..ModelCapabilities::default()
    }
}

fn reasoning_capabilities() -> ModelCapabilities {
    ModelCapabilities {
        streaming: true,
        tools: true,
        reasoning: true,
        json_output: true,
        json_output_schema: true,
        ..ModelCapabilities::default()
    }
}

/// Reasoning models reject classic sampling controls
const REASONING_PARAMETERS: [SamplingParameter; 1] = [SamplingParameter::MaxTokens];

pub(super) fn builtin_models() -> Vec<ModelDefinition> {
    vec![
        ModelDefinition::new("gpt-4o", "openai")
            .with_provider(
                ProviderModelMapping::new(ProviderId::OpenAI, "gpt-4o", dec!(0.0000025), dec!(0.00001))
                    .with_cached_input_price(dec!(0.00000125))
                    .with_limits(128_000, 16_384)
                    .with_capabilities(ModelCapabilities {
                        json_output_schema: true,
                        ..chat_capabilities(true, true, true)
                    }),
            )
            .with_provider(
                ProviderModelMapping::new(ProviderId::Azure, "gpt-4o", dec!(0.0000025), dec!(0.00001))
                    .with_cached_input_price(dec!(0.00000125))
                    .with_limits(128_000, 16_384)
                    .with_capabilities(chat_capabilities(true, true, true)),
            ),
        ModelDefinition::new("gpt-4o-mini", "openai")
            .with_provider(
                ProviderModelMapping::new(
                    ProviderId::OpenAI,
                    "gpt-4o-mini",
                    dec!(0.00000015),
                    dec!(0.0000006),
                )
                .with_cached_input_price(dec!(0.000000075))
                .with_limits(128_000, 16_384)
                .with_capabilities(chat_capabilities(true, true, true)),
            )
            .with_provider(
                ProviderModelMapping::new(
                    ProviderId::Azure,
                    "gpt-4o-mini",
                    dec!(0.000000165),
                    dec!(0.00000066),
                )
                .with_limits(128_000, 16_384)
                .with_capabilities(chat_capabilities(true, true, true)),
            ),
        ModelDefinition::new("o3-pro", "openai").with_provider(
            ProviderModelMapping::new(ProviderId::OpenAI, "o3-pro", dec!(0.00002), dec!(0.00008))
                .with_limits(200_000, 100_000)
                .with_capabilities(ModelCapabilities {
                    streaming: false,
                    responses_api: true,
                    ..reasoning_capabilities()
                })
                .with_supported_parameters(REASONING_PARAMETERS),
        ),
        ModelDefinition::new("claude-3-5-sonnet", "anthropic")
            .with_provider(
                ProviderModelMapping::new(
                    ProviderId::Anthropic,
                    "claude-3-5-sonnet-20241022",
                    dec!(0.000003),
                    dec!(0.000015),
                )
                .with_cached_input_price(dec!(0.0000003))
                .with_limits(200_000, 8_192)
                .with_capabilities(chat_capabilities(true, true, false)),
            )
            .with_provider(
                ProviderModelMapping::new(
                    ProviderId::AwsBedrock,
                    "anthropic.claude-3-5-sonnet-20241022-v2:0",
                    dec!(0.000003),
                    dec!(0.000015),
                )
                .with_limits(200_000, 8_192)
                .with_capabilities(chat_capabilities(true, true, false)),
            ),
        ModelDefinition::new("claude-sonnet-4", "anthropic").with_provider(
            ProviderModelMapping::new(
                ProviderId::Anthropic,
                "claude-sonnet-4-20250514",
                dec!(0.000003),
                dec!(0.000015),
            )
            .with_cached_input_price(dec!(0.0000003))
            .with_limits(200_000, 64_000)
            .with_capabilities(reasoning_capabilities()),
        ),
        ModelDefinition::new("gemini-2.0-flash", "google")
            .with_provider(
                ProviderModelMapping::new(
                    ProviderId::GoogleAiStudio,
                    "gemini-2.0-flash",
                    dec!(0.0000001),
                    dec!(0.0000004),
                )
                .with_cached_input_price(dec!(0.000000025))
                .with_limits(1_048_576, 8_192)
                .with_capabilities(chat_capabilities(true, true, true)),
            )
            .with_provider(
                ProviderModelMapping::new(
                    ProviderId::GoogleVertex,
                    "gemini-2.0-flash",
                    dec!(0.00000015),
                    dec!(0.0000006),
                )
                .with_limits(1_048_576, 8_192)
                .with_capabilities(chat_capabilities(true, true, true)),
            ),
        ModelDefinition::new("gemma-3-27b", "google").free().with_provider(
            ProviderModelMapping::new(
                ProviderId::GoogleAiStudio,
                "gemma-3-27b-it",
                dec!(0),
                dec!(0),
            )
            .with_limits(128_000, 8_192)
            .with_capabilities(chat_capabilities(false, true, false)),
        ),
        ModelDefinition::new("llama-3.3-70b-instruct", "meta")
            .with_provider(
                ProviderModelMapping::new(
                    ProviderId::Groq,
                    "llama-3.3-70b-versatile",
                    dec!(0.00000059),
                    dec!(0.00000079),
                )
                .with_limits(131_072, 32_768)
                .with_capabilities(chat_capabilities(true, false, true)),
            )
            .with_provider(
                ProviderModelMapping::new(
                    ProviderId::TogetherAi,
                    "meta-llama/Llama-3.3-70B-Instruct-Turbo",
                    dec!(0.00000088),
                    dec!(0.00000088),
                )
                .with_limits(131_072, 8_192)
                .with_capabilities(chat_capabilities(true, false, true)),
            ),
        ModelDefinition::new("deepseek-v3", "deepseek")
            .with_provider(
                ProviderModelMapping::new(
                    ProviderId::DeepSeek,
                    "deepseek-chat",
                    dec!(0.00000027),
                    dec!(0.0000011),
                )
                .with_cached_input_price(dec!(0.00000007))
                .with_limits(64_000, 8_192)
                .with_capabilities(chat_capabilities(true, false, true)),
            )
            .with_provider(
                ProviderModelMapping::new(
                    ProviderId::TogetherAi,
                    "deepseek-ai/DeepSeek-V3",
                    dec!(0.00000125),
                    dec!(0.00000125),
                )
                .with_discount(dec!(0.2))
                .with_limits(131_072, 8_192)
                .with_capabilities(chat_capabilities(true, false, true)),
            ),
        ModelDefinition::new("mistral-large", "mistral")
            .with_provider(
                ProviderModelMapping::new(
                    ProviderId::Mistral,
                    "mistral-large-latest",
                    dec!(0.000002),
                    dec!(0.000006),
                )
                .with_limits(131_072, 8_192)
                .with_capabilities(chat_capabilities(true, false, true)),
            )
            .with_provider(
                ProviderModelMapping::new(
                    ProviderId::AwsBedrock,
                    "mistral.mistral-large-2407-v1:0",
                    dec!(0.000002),
                    dec!(0.000006),
                )
                .with_limits(128_000, 8_192)
                .with_capabilities(chat_capabilities(true, false, false))
                .with_stability(StabilityLevel::Experimental),
            ),
        ModelDefinition::new("grok-3-mini", "xai")
            .with_stability(StabilityLevel::Beta)
            .with_provider(
                ProviderModelMapping::new(ProviderId::XAi, "grok-3-mini", dec!(0.0000003), dec!(0.0000005))
                    .with_limits(131_072, 16_384)
                    .with_capabilities(reasoning_capabilities())
                    .with_supported_parameters([
                        SamplingParameter::Temperature,
                        SamplingParameter::TopP,
                        SamplingParameter::MaxTokens,
                    ]),
            ),
    ]
}
