//! Per-request cost calculation
//!
//! All arithmetic is exact `Decimal`; prices are per token.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::types::{CostBreakdown, CostError, CostResult, RetentionLevel, TokenUsage};
use crate::config::CostSettings;
use crate::core::catalog::{ModelDefinition, ProviderModelMapping};

const TOKENS_PER_MILLION: Decimal = dec!(1000000);

fn validate(mapping: &ProviderModelMapping, discount: Decimal) -> CostResult<()> {
    if discount < Decimal::ZERO || discount >= Decimal::ONE {
        return Err(CostError::InvalidDiscount(discount));
    }
    let prices = [
        ("input", mapping.input_price),
        ("output", mapping.output_price),
        ("request", mapping.request_price),
        ("cached input", mapping.cached_input_price.unwrap_or_default()),
    ];
    for (field, price) in prices {
        if price < Decimal::ZERO {
            return Err(CostError::NegativePrice {
                model: mapping.model_name.clone(),
                field,
            });
        }
    }
    Ok(())
}

/// Token and request cost of one response under `discount`
///
/// Cached prompt tokens move from the input rate to the cached input rate
/// (the input rate when the mapping declares none); reasoning tokens are
/// billed at the output rate.
pub fn calculate_costs(
    mapping: &ProviderModelMapping,
    usage: &TokenUsage,
    discount: Decimal,
) -> CostResult<CostBreakdown> {
    validate(mapping, discount)?;
    let factor = Decimal::ONE - discount;

    let cached_price = mapping.cached_input_price.unwrap_or(mapping.input_price);
    let input_cost = Decimal::from(usage.uncached_prompt_tokens()) * mapping.input_price * factor;
    let output_cost = (Decimal::from(usage.completion_tokens) + Decimal::from(usage.reasoning_tokens))
        * mapping.output_price
        * factor;
    let cached_input_cost = Decimal::from(usage.cached_tokens) * cached_price * factor;
    let request_cost = mapping.request_price * factor;

    Ok(CostBreakdown {
        input_cost,
        output_cost,
        cached_input_cost,
        request_cost,
        data_storage_cost: Decimal::ZERO,
        total_cost: input_cost + output_cost + cached_input_cost + request_cost,
        discount,
        estimated: usage.estimated,
    })
}

/// Flat storage fee; nothing is stored when retention is `None`
pub fn data_storage_cost(
    usage: &TokenUsage,
    rate_per_million: Decimal,
    retention: RetentionLevel,
) -> Decimal {
    match retention {
        RetentionLevel::None => Decimal::ZERO,
        RetentionLevel::Retain => Decimal::from(usage.total_tokens()) * rate_per_million / TOKENS_PER_MILLION,
    }
}

/// Applies catalog-level rules (free models, storage fee) on top of [`calculate_costs`]
#[derive(Debug, Clone)]
pub struct CostCalculator {
    data_storage_rate: Decimal,
}

impl Default for CostCalculator {
    fn default() -> Self {
        Self::new(&CostSettings::default())
    }
}

impl CostCalculator {
    pub fn new(settings: &CostSettings) -> Self {
        Self {
            data_storage_rate: settings.data_storage_cost_per_million_tokens,
        }
    }

    pub fn calculate(
        &self,
        model: &ModelDefinition,
        mapping: &ProviderModelMapping,
        usage: &TokenUsage,
        discount: Decimal,
        retention: RetentionLevel,
    ) -> CostResult<CostBreakdown> {
        let mut breakdown = if model.free {
            CostBreakdown::free(usage.estimated)
        } else {
            calculate_costs(mapping, usage, discount)?
        };
        breakdown.data_storage_cost = data_storage_cost(usage, self.data_storage_rate, retention);
        Ok(breakdown)
    }
}
