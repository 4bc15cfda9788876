//! Router tests module

mod execution_tests;
mod executor_tests;
mod fallback_tests;

use crate::core::catalog::{ModelDefinition, ProviderModelMapping};
use crate::core::providers::ProviderId;
use rust_decimal::Decimal;

/// Mapping priced so that effective price = `price`
pub(crate) fn mapping(provider: ProviderId, price: Decimal) -> ProviderModelMapping {
    ProviderModelMapping::new(provider, format!("{}-model", provider), price, price)
}

pub(crate) fn model(mappings: Vec<ProviderModelMapping>) -> ModelDefinition {
    mappings
        .into_iter()
        .fold(ModelDefinition::new("test-model", "test"), |m, p| m.with_provider(p))
}
