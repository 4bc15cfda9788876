//! Cost metering
//!
//! Token accounting, discount resolution and exact-decimal cost calculation
//! for completed requests.
//!
//! ## Module Structure
//! - `types`: token usage, cost breakdown and errors
//! - `tokens`: heuristic estimation when the provider reports no usage
//! - `discount`: discount store, its cache and precedence resolution
//! - `calculator`: the cost formula

pub mod calculator;
pub mod discount;
pub mod tokens;
pub mod types;

pub use calculator::{CostCalculator, calculate_costs, data_storage_cost};
pub use discount::{
    CachedDiscountStore, Discount, DiscountResolver, DiscountSource, DiscountStore,
    DiscountTarget, EffectiveDiscount, InMemoryDiscountStore, resolve_discount, store_error,
};
pub use tokens::{estimate_prompt_tokens, estimate_tokens, resolve_usage};
pub use types::{CostBreakdown, CostError, CostResult, RetentionLevel, TokenUsage};
