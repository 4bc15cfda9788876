//! Scoring primitives
//!
//! Min-max normalization across the candidate set, oriented so that lower is
//! always better, and the weighted sum over the four axes.

use crate::config::ScoringWeights;

/// Raw per-candidate values before normalization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisValues {
    pub price: f64,
    pub uptime: f64,
    pub throughput: f64,
    pub latency_ms: f64,
}

fn range(values: &[f64]) -> Option<(f64, f64)> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (min.is_finite() && max.is_finite()).then_some((min, max))
}

/// Normalize to [0, 1] where the smallest raw value maps to 0
///
/// A zero range maps every value to 0, so the axis does not contribute.
pub fn normalize_lower_better(values: &[f64]) -> Vec<f64> {
    match range(values) {
        Some((min, max)) if max > min => values.iter().map(|v| (v - min) / (max - min)).collect(),
        _ => vec![0.0; values.len()],
    }
}

/// Normalize to [0, 1] where the largest raw value maps to 0
pub fn normalize_higher_better(values: &[f64]) -> Vec<f64> {
    match range(values) {
        Some((min, max)) if max > min => values.iter().map(|v| (max - v) / (max - min)).collect(),
        _ => vec![0.0; values.len()],
    }
}

/// Weighted score per candidate; lower is better
pub fn weighted_scores(values: &[AxisValues], weights: &ScoringWeights) -> Vec<f64> {
    let column = |f: fn(&AxisValues) -> f64| values.iter().map(f).collect::<Vec<_>>();

    let price = normalize_lower_better(&column(|v| v.price));
    let uptime = normalize_higher_better(&column(|v| v.uptime));
    let throughput = normalize_higher_better(&column(|v| v.throughput));
    let latency = normalize_lower_better(&column(|v| v.latency_ms));

    (0..values.len())
        .map(|i| {
            weights.price * price[i]
                + weights.uptime * uptime[i]
                + weights.throughput * throughput[i]
                + weights.latency * latency[i]
        })
        .collect()
}

/// Index of the minimum, first occurrence on ties
///
/// Non-finite scores lose to any finite one; if none is finite the first
/// candidate wins.
pub fn argmin(scores: &[f64]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_finite())
        .fold(None, |best: Option<(usize, f64)>, (i, &s)| match best {
            Some((_, b)) if b <= s => best,
            _ => Some((i, s)),
        })
        .map(|(i, _)| i)
        .or_else(|| (!scores.is_empty()).then_some(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_orientation() {
        assert_eq!(normalize_lower_better(&[1.0, 3.0, 2.0]), vec![0.0, 1.0, 0.5]);
        assert_eq!(normalize_higher_better(&[1.0, 3.0, 2.0]), vec![1.0, 0.0, 0.5]);
    }

    #[test]
    fn test_zero_range_contributes_nothing() {
        assert_eq!(normalize_lower_better(&[5.0, 5.0]), vec![0.0, 0.0]);
        assert_eq!(normalize_higher_better(&[]), Vec::<f64>::new());
    }

    #[test]
    fn test_argmin_first_occurrence() {
        assert_eq!(argmin(&[0.3, 0.1, 0.1]), Some(1));
        assert_eq!(argmin(&[]), None);
    }

    #[test]
    fn test_argmin_ignores_non_finite() {
        assert_eq!(argmin(&[f64::NAN, 0.4, 0.2]), Some(2));
        assert_eq!(argmin(&[0.4, f64::NAN, f64::NEG_INFINITY]), Some(0));
        assert_eq!(argmin(&[f64::NAN, f64::NAN]), Some(0));
    }

    #[test]
    fn test_uptime_dominates() {
        let values = [
            AxisValues { price: 1.0, uptime: 99.0, throughput: 50.0, latency_ms: 500.0 },
            AxisValues { price: 0.5, uptime: 80.0, throughput: 50.0, latency_ms: 500.0 },
        ];
        let scores = weighted_scores(&values, &ScoringWeights::default());
        assert!((scores[0] - 0.2).abs() < 1e-9);
        assert!((scores[1] - 0.5).abs() < 1e-9);
        assert_eq!(argmin(&scores), Some(0));
    }
}
