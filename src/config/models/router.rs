//! Router configuration

use super::*;
use serde::{Deserialize, Serialize};

/// Provider selection and retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterSettings {
    /// Maximum retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Probability of picking a random eligible provider instead of the best scored one.
    /// Set to 0 for deterministic routing.
    #[serde(default = "default_exploration_rate")]
    pub exploration_rate: f64,
    /// Trailing window for provider metrics, in minutes
    #[serde(default = "default_metrics_window_minutes")]
    pub metrics_window_minutes: u32,
    /// Timeout of a single upstream attempt, in seconds
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,
    /// Scoring weights
    #[serde(default)]
    pub weights: ScoringWeights,
    /// Assumed metrics for providers without measurements
    #[serde(default)]
    pub defaults: MetricDefaults,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            exploration_rate: default_exploration_rate(),
            metrics_window_minutes: default_metrics_window_minutes(),
            upstream_timeout_secs: default_upstream_timeout_secs(),
            weights: ScoringWeights::default(),
            defaults: MetricDefaults::default(),
        }
    }
}

impl RouterSettings {
    /// Settings with exploration disabled, for deterministic selection
    pub fn deterministic() -> Self {
        Self {
            exploration_rate: 0.0,
            ..Self::default()
        }
    }
}

/// Weights of the four scoring axes; must sum to 1
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub price: f64,
    pub uptime: f64,
    pub throughput: f64,
    pub latency: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            price: 0.2,
            uptime: 0.5,
            throughput: 0.2,
            latency: 0.1,
        }
    }
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.price + self.uptime + self.throughput + self.latency
    }
}

/// Optimistic metrics assumed for unmeasured providers
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MetricDefaults {
    /// Uptime percentage
    pub uptime: f64,
    /// Average latency in milliseconds
    pub latency_ms: f64,
    /// Throughput in tokens per second
    pub throughput: f64,
}

impl Default for MetricDefaults {
    fn default() -> Self {
        Self {
            uptime: 100.0,
            latency_ms: 1000.0,
            throughput: 50.0,
        }
    }
}

fn default_exploration_rate() -> f64 {
    0.01
}

fn default_metrics_window_minutes() -> u32 {
    5
}

fn default_upstream_timeout_secs() -> u64 {
    600
}
