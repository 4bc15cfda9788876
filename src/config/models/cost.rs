//! Cost and discount settings

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Cost calculation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostSettings {
    /// Flat fee per million stored tokens when request data is retained
    #[serde(default = "default_data_storage_cost")]
    pub data_storage_cost_per_million_tokens: Decimal,
    /// How long discount rows stay cached per organization
    #[serde(default = "default_discount_cache_ttl_secs")]
    pub discount_cache_ttl_secs: u64,
    /// Maximum number of cached organizations
    #[serde(default = "default_discount_cache_capacity")]
    pub discount_cache_capacity: u64,
}

impl Default for CostSettings {
    fn default() -> Self {
        Self {
            data_storage_cost_per_million_tokens: default_data_storage_cost(),
            discount_cache_ttl_secs: default_discount_cache_ttl_secs(),
            discount_cache_capacity: default_discount_cache_capacity(),
        }
    }
}

fn default_data_storage_cost() -> Decimal {
    dec!(0.01)
}

fn default_discount_cache_ttl_secs() -> u64 {
    60
}

fn default_discount_cache_capacity() -> u64 {
    10_000
}
