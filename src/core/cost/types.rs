//! Cost calculation types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::providers::UpstreamUsage;

/// Token counts billed for one request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens, cached ones included
    pub prompt_tokens: u32,
    /// Visible completion tokens
    pub completion_tokens: u32,
    /// Portion of the prompt served from the provider's prompt cache
    pub cached_tokens: u32,
    /// Hidden reasoning tokens, billed at the output rate
    pub reasoning_tokens: u32,
    /// Counts were produced by the local tokenizer, not reported upstream
    pub estimated: bool,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            ..Default::default()
        }
    }

    pub fn with_cached(mut self, cached_tokens: u32) -> Self {
        self.cached_tokens = cached_tokens;
        self
    }

    pub fn with_reasoning(mut self, reasoning_tokens: u32) -> Self {
        self.reasoning_tokens = reasoning_tokens;
        self
    }

    pub fn estimated(mut self) -> Self {
        self.estimated = true;
        self
    }

    /// Prompt tokens billed at the regular input rate
    pub fn uncached_prompt_tokens(&self) -> u32 {
        self.prompt_tokens.saturating_sub(self.cached_tokens)
    }

    pub fn total_tokens(&self) -> u64 {
        u64::from(self.prompt_tokens)
            + u64::from(self.completion_tokens)
            + u64::from(self.reasoning_tokens)
    }
}

impl From<UpstreamUsage> for TokenUsage {
    fn from(usage: UpstreamUsage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            cached_tokens: usage.cached_tokens,
            reasoning_tokens: usage.reasoning_tokens,
            estimated: false,
        }
    }
}

/// Caller's data retention policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionLevel {
    /// Request and response bodies are not stored
    None,
    #[default]
    Retain,
}

/// Monetary cost of one request, all amounts in USD
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub input_cost: Decimal,
    pub output_cost: Decimal,
    pub cached_input_cost: Decimal,
    pub request_cost: Decimal,
    /// Billed separately; not part of `total_cost`
    pub data_storage_cost: Decimal,
    pub total_cost: Decimal,
    /// Discount fraction that was applied
    pub discount: Decimal,
    pub estimated: bool,
}

impl CostBreakdown {
    /// Zero-cost breakdown for free models
    pub fn free(estimated: bool) -> Self {
        Self {
            estimated,
            ..Default::default()
        }
    }
}

/// Cost and discount errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CostError {
    #[error("Discount {0} is outside [0, 1)")]
    InvalidDiscount(Decimal),

    #[error("Negative {field} price for {model}")]
    NegativePrice { model: String, field: &'static str },

    #[error("Discount store error: {0}")]
    Store(String),
}

pub type CostResult<T> = Result<T, CostError>;
