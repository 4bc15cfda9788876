//! Provider routing: selection, retry eligibility and the attempt loop
//!
//! ## Module Structure
//!
//! - `selection` - Provider scoring and exploration
//! - `strategy_impl` - Normalization and weighted scoring primitives
//! - `execution` - Pure retry eligibility rules
//! - `fallback` - Retry state and next-provider selection
//! - `execute_impl` - Sequential attempt loop with cancellation
//! - `error` - Router errors

pub mod error;
pub mod execute_impl;
pub mod execution;
pub mod fallback;
pub mod selection;
pub mod strategy_impl;

#[cfg(test)]
mod tests;

pub use error::RouterError;
pub use execute_impl::{
    AttemptRecord, ExecutionFailure, ExecutionOutcome, ExecutionPlan, RequestExecutor,
};
pub use execution::{
    MAX_RETRIES, RetryPolicy, get_error_type, is_retryable_error, should_retry_request,
};
pub use fallback::{RetryContext, select_next_provider};
pub use selection::{
    ProviderScore, ProviderSelection, ProviderSelector, SelectionConfig, SelectionReason,
    effective_price,
};
