//! Provider selection
//!
//! Scores the eligible providers of one model and picks the best, with a small
//! epsilon-greedy exploration share so unpopular providers keep producing
//! fresh metrics.
//!
//! # Flow
//!
//! 1. Drop candidates whose effective stability is unstable or experimental
//! 2. Score every survivor (price only without metrics, weighted otherwise)
//! 3. With probability `exploration_rate` pick a uniformly random survivor
//! 4. Otherwise pick the minimum score, first occurrence on ties

use super::strategy_impl::{AxisValues, argmin, weighted_scores};
use crate::config::{MetricDefaults, RouterSettings, ScoringWeights};
use crate::core::catalog::{ModelDefinition, ProviderModelMapping};
use crate::core::metrics::{MetricsKey, MetricsSnapshot};
use crate::core::providers::ProviderId;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use tracing::debug;

/// Average of input and output price after the catalog discount
pub fn effective_price(mapping: &ProviderModelMapping) -> Decimal {
    (mapping.input_price + mapping.output_price) / Decimal::TWO * (Decimal::ONE - mapping.discount)
}

/// A measured value, or the default when it is missing or not a finite number
fn finite_or(measured: Option<f64>, default: f64) -> f64 {
    measured.filter(|v| v.is_finite()).unwrap_or(default)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionReason {
    RandomExploration,
    /// Metrics were unavailable
    PriceOnly,
    /// Metrics were available but empty for every candidate
    PriceOnlyNoMetrics,
    WeightedScore,
    /// The caller named the provider
    Pinned,
}

impl SelectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionReason::RandomExploration => "random-exploration",
            SelectionReason::PriceOnly => "price-only",
            SelectionReason::PriceOnlyNoMetrics => "price-only-no-metrics",
            SelectionReason::WeightedScore => "weighted-score",
            SelectionReason::Pinned => "pinned",
        }
    }
}

/// Score of one candidate; lower is better
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderScore {
    pub provider_id: ProviderId,
    pub score: f64,
    pub price: f64,
    pub uptime: f64,
    pub latency_ms: f64,
    pub throughput: f64,
    /// Whether the pair had measured metrics
    pub measured: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderSelection {
    pub selected: ProviderModelMapping,
    pub scores: Vec<ProviderScore>,
    pub reason: SelectionReason,
}

#[derive(Debug, Clone, Copy)]
pub struct SelectionConfig {
    pub weights: ScoringWeights,
    pub defaults: MetricDefaults,
    /// Probability in [0, 1]; 0 disables exploration
    pub exploration_rate: f64,
}

impl From<&RouterSettings> for SelectionConfig {
    fn from(settings: &RouterSettings) -> Self {
        Self {
            weights: settings.weights,
            defaults: settings.defaults,
            exploration_rate: settings.exploration_rate,
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self::from(&RouterSettings::default())
    }
}

/// Selection engine with its own random source
#[derive(Debug)]
pub struct ProviderSelector {
    config: SelectionConfig,
    rng: Mutex<StdRng>,
}

impl ProviderSelector {
    pub fn new(config: SelectionConfig) -> Self {
        Self {
            config,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible selector for tests and dry runs
    pub fn with_seed(config: SelectionConfig, seed: u64) -> Self {
        Self {
            config,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Exploration disabled, fixed seed
    pub fn deterministic() -> Self {
        Self::with_seed(
            SelectionConfig {
                exploration_rate: 0.0,
                ..SelectionConfig::default()
            },
            0,
        )
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Candidates that automatic selection may use
    pub fn eligible<'a>(
        &self,
        model: &ModelDefinition,
        candidates: &'a [ProviderModelMapping],
    ) -> Vec<&'a ProviderModelMapping> {
        candidates
            .iter()
            .filter(|m| model.effective_stability(m).is_routable())
            .collect()
    }

    /// Pick a provider for `model` among the IAM-filtered `candidates`
    ///
    /// `metrics` is `None` when the metrics store could not be read.
    pub fn select(
        &self,
        model: &ModelDefinition,
        candidates: &[ProviderModelMapping],
        metrics: Option<&MetricsSnapshot>,
    ) -> Option<ProviderSelection> {
        let eligible = self.eligible(model, candidates);
        if eligible.is_empty() {
            debug!(model = %model.id, "no eligible providers after stability filter");
            return None;
        }

        let (scores, scored_reason) = self.score(&model.id, &eligible, metrics);

        let rate = self.config.exploration_rate.clamp(0.0, 1.0);
        let (index, reason) = {
            let mut rng = self.rng.lock();
            if rate > 0.0 && rng.gen_bool(rate) {
                (rng.gen_range(0..eligible.len()), SelectionReason::RandomExploration)
            } else {
                let scores: Vec<f64> = scores.iter().map(|s| s.score).collect();
                (argmin(&scores)?, scored_reason)
            }
        };

        let selected = eligible[index].clone();
        debug!(
            model = %model.id,
            provider = %selected.provider_id,
            reason = reason.as_str(),
            candidates = eligible.len(),
            "selected provider"
        );

        Some(ProviderSelection {
            selected,
            scores,
            reason,
        })
    }

    /// Caller-named provider; bypasses scoring but still needs a mapping
    pub fn select_pinned(
        &self,
        model: &ModelDefinition,
        candidates: &[ProviderModelMapping],
        provider: ProviderId,
    ) -> Option<ProviderSelection> {
        let selected = candidates.iter().find(|m| m.provider_id == provider)?.clone();
        let (scores, _) = self.score(&model.id, &[&selected], None);
        Some(ProviderSelection {
            selected,
            scores,
            reason: SelectionReason::Pinned,
        })
    }

    fn score(
        &self,
        model_id: &str,
        eligible: &[&ProviderModelMapping],
        metrics: Option<&MetricsSnapshot>,
    ) -> (Vec<ProviderScore>, SelectionReason) {
        let defaults = self.config.defaults;
        let measured: Vec<_> = eligible
            .iter()
            .map(|m| metrics.and_then(|s| s.get(&MetricsKey::new(model_id, m.provider_id))))
            .collect();

        let values: Vec<AxisValues> = eligible
            .iter()
            .zip(&measured)
            .map(|(m, metric)| AxisValues {
                price: effective_price(m).to_f64().unwrap_or(f64::MAX),
                uptime: finite_or(metric.map(|x| x.uptime), defaults.uptime),
                throughput: finite_or(metric.map(|x| x.throughput), defaults.throughput),
                latency_ms: finite_or(metric.map(|x| x.average_latency_ms), defaults.latency_ms),
            })
            .collect();

        let (raw, reason) = match metrics {
            None => (values.iter().map(|v| v.price).collect(), SelectionReason::PriceOnly),
            Some(_) if measured.iter().all(Option::is_none) => (
                values.iter().map(|v| v.price).collect(),
                SelectionReason::PriceOnlyNoMetrics,
            ),
            Some(_) => (
                weighted_scores(&values, &self.config.weights),
                SelectionReason::WeightedScore,
            ),
        };

        let scores = eligible
            .iter()
            .zip(values.iter().zip(raw))
            .zip(&measured)
            .map(|((m, (v, score)), metric)| ProviderScore {
                provider_id: m.provider_id,
                score,
                price: v.price,
                uptime: v.uptime,
                latency_ms: v.latency_ms,
                throughput: v.throughput,
                measured: metric.is_some(),
            })
            .collect();

        (scores, reason)
    }
}
