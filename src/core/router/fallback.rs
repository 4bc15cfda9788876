//! Retry state and next-provider selection

use super::selection::ProviderScore;
use crate::core::catalog::ProviderModelMapping;
use crate::core::providers::ProviderId;
use std::collections::HashSet;

/// Per-request retry state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryContext {
    pub requested_provider: Option<ProviderId>,
    pub no_fallback: bool,
    pub retry_count: u32,
    pub failed_providers: HashSet<ProviderId>,
    /// Size of the scored candidate set
    pub total_providers: usize,
}

impl RetryContext {
    pub fn new(requested_provider: Option<ProviderId>, no_fallback: bool, total_providers: usize) -> Self {
        Self {
            requested_provider,
            no_fallback,
            retry_count: 0,
            failed_providers: HashSet::new(),
            total_providers,
        }
    }

    /// Providers not yet tried and failed
    pub fn remaining_providers(&self) -> usize {
        self.total_providers.saturating_sub(self.failed_providers.len())
    }

    /// Mark `provider` as failed for the rest of this request
    pub fn record_failure(&mut self, provider: ProviderId) {
        self.failed_providers.insert(provider);
    }

    pub fn record_retry(&mut self) {
        self.retry_count += 1;
    }

    pub fn has_failed(&self, provider: ProviderId) -> bool {
        self.failed_providers.contains(&provider)
    }
}

/// Lowest-scored provider that has not failed yet, mapped back to its model mapping
///
/// Returns `None` when nothing survives or the best survivor has no mapping.
pub fn select_next_provider<'a>(
    scores: &[ProviderScore],
    failed_providers: &HashSet<ProviderId>,
    model_mappings: &'a [ProviderModelMapping],
) -> Option<&'a ProviderModelMapping> {
    let mut remaining: Vec<&ProviderScore> = scores
        .iter()
        .filter(|s| !failed_providers.contains(&s.provider_id))
        .collect();
    // Stable sort keeps the first occurrence on ties
    remaining.sort_by(|a, b| {
        (!a.score.is_finite())
            .cmp(&!b.score.is_finite())
            .then(a.score.total_cmp(&b.score))
    });

    let best = remaining.first()?;
    model_mappings
        .iter()
        .find(|m| m.provider_id == best.provider_id)
}
