//! Next-provider selection tests

use super::mapping;
use crate::core::providers::ProviderId;
use crate::core::router::fallback::{RetryContext, select_next_provider};
use crate::core::router::selection::ProviderScore;
use rust_decimal_macros::dec;
use std::collections::HashSet;

fn score(provider_id: ProviderId, score: f64) -> ProviderScore {
    ProviderScore {
        provider_id,
        score,
        price: 0.0,
        uptime: 100.0,
        latency_ms: 1000.0,
        throughput: 50.0,
        measured: false,
    }
}

#[test]
fn test_picks_lowest_non_failed() {
    let scores = vec![
        score(ProviderId::OpenAI, 0.1),
        score(ProviderId::Azure, 0.4),
        score(ProviderId::Groq, 0.2),
    ];
    let mappings = vec![
        mapping(ProviderId::OpenAI, dec!(1)),
        mapping(ProviderId::Azure, dec!(1)),
        mapping(ProviderId::Groq, dec!(1)),
    ];
    let failed: HashSet<_> = [ProviderId::OpenAI].into_iter().collect();

    let next = select_next_provider(&scores, &failed, &mappings).unwrap();
    assert_eq!(next.provider_id, ProviderId::Groq);
    assert_eq!(next.model_name, "groq-model");
}

#[test]
fn test_non_finite_scores_rank_last() {
    let scores = vec![
        score(ProviderId::Mistral, f64::NAN),
        score(ProviderId::XAi, 0.9),
        score(ProviderId::Groq, -f64::NAN),
    ];
    let mappings = vec![
        mapping(ProviderId::Mistral, dec!(1)),
        mapping(ProviderId::XAi, dec!(1)),
        mapping(ProviderId::Groq, dec!(1)),
    ];
    let next = select_next_provider(&scores, &HashSet::new(), &mappings).unwrap();
    assert_eq!(next.provider_id, ProviderId::XAi);
}

#[test]
fn test_ties_keep_score_order() {
    let scores = vec![score(ProviderId::Mistral, 0.3), score(ProviderId::XAi, 0.3)];
    let mappings = vec![
        mapping(ProviderId::XAi, dec!(1)),
        mapping(ProviderId::Mistral, dec!(1)),
    ];
    let next = select_next_provider(&scores, &HashSet::new(), &mappings).unwrap();
    assert_eq!(next.provider_id, ProviderId::Mistral);
}

#[test]
fn test_none_when_all_failed_or_empty() {
    let mappings = vec![mapping(ProviderId::OpenAI, dec!(1))];
    let failed: HashSet<_> = [ProviderId::OpenAI].into_iter().collect();

    assert!(select_next_provider(&[score(ProviderId::OpenAI, 0.0)], &failed, &mappings).is_none());
    assert!(select_next_provider(&[], &HashSet::new(), &mappings).is_none());
}

#[test]
fn test_none_when_best_has_no_mapping() {
    let scores = vec![score(ProviderId::Groq, 0.0), score(ProviderId::OpenAI, 0.5)];
    let mappings = vec![mapping(ProviderId::OpenAI, dec!(1))];
    assert!(select_next_provider(&scores, &HashSet::new(), &mappings).is_none());
}

#[test]
fn test_retry_context_accounting() {
    let mut ctx = RetryContext::new(None, false, 3);
    assert_eq!(ctx.remaining_providers(), 3);

    ctx.record_failure(ProviderId::OpenAI);
    ctx.record_failure(ProviderId::OpenAI);
    ctx.record_retry();
    assert_eq!(ctx.remaining_providers(), 2);
    assert_eq!(ctx.retry_count, 1);
    assert!(ctx.has_failed(ProviderId::OpenAI));
    assert!(!ctx.has_failed(ProviderId::Azure));
}
