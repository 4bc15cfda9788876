//! Provider metrics read path
//!
//! Rolling uptime, latency and throughput per (model, provider) pair. The
//! aggregation job lives outside this crate; the core only reads snapshots.

use crate::core::providers::ProviderId;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Aggregated metrics of one (model, provider) pair over a trailing window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProviderMetrics {
    /// Success percentage in [0, 100]
    pub uptime: f64,
    pub average_latency_ms: f64,
    /// Output tokens per second
    pub throughput: f64,
    pub total_requests: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetricsKey {
    pub model_id: String,
    pub provider_id: ProviderId,
}

impl MetricsKey {
    pub fn new(model_id: impl Into<String>, provider_id: ProviderId) -> Self {
        Self {
            model_id: model_id.into(),
            provider_id,
        }
    }
}

pub type MetricsSnapshot = HashMap<MetricsKey, ProviderMetrics>;

/// Error raised by a metrics backend
#[derive(Debug, Clone, thiserror::Error)]
#[error("Metrics store unavailable: {0}")]
pub struct MetricsError(pub String);

/// Read access to provider metrics
#[async_trait]
pub trait ProviderMetricsStore: Send + Sync {
    /// Every pair with data in the window
    async fn get_provider_metrics(
        &self,
        window_minutes: u32,
    ) -> Result<MetricsSnapshot, MetricsError>;

    /// Only the requested pairs; pairs without data are absent from the result
    async fn get_provider_metrics_for_combinations(
        &self,
        pairs: &[MetricsKey],
        window_minutes: u32,
    ) -> Result<MetricsSnapshot, MetricsError> {
        let all = self.get_provider_metrics(window_minutes).await?;
        Ok(pairs
            .iter()
            .filter_map(|k| all.get(k).map(|m| (k.clone(), *m)))
            .collect())
    }
}

/// Snapshot store swapped wholesale by an out-of-band refresher
#[derive(Debug, Default)]
pub struct InMemoryMetricsStore {
    snapshot: ArcSwap<MetricsSnapshot>,
    window_minutes: u32,
}

impl InMemoryMetricsStore {
    pub fn new(window_minutes: u32) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(MetricsSnapshot::new()),
            window_minutes,
        }
    }

    pub fn with_snapshot(window_minutes: u32, snapshot: MetricsSnapshot) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(snapshot),
            window_minutes,
        }
    }

    /// Replace the whole snapshot; concurrent readers keep the previous one
    pub fn replace_snapshot(&self, snapshot: MetricsSnapshot) {
        self.snapshot.store(Arc::new(snapshot));
    }

    pub fn window_minutes(&self) -> u32 {
        self.window_minutes
    }
}

#[async_trait]
impl ProviderMetricsStore for InMemoryMetricsStore {
    async fn get_provider_metrics(
        &self,
        window_minutes: u32,
    ) -> Result<MetricsSnapshot, MetricsError> {
        // One aggregation window is held in memory
        if window_minutes != self.window_minutes {
            tracing::debug!(
                requested = window_minutes,
                held = self.window_minutes,
                "metrics window mismatch, serving held window"
            );
        }
        Ok(self.snapshot.load().as_ref().clone())
    }

    async fn get_provider_metrics_for_combinations(
        &self,
        pairs: &[MetricsKey],
        _window_minutes: u32,
    ) -> Result<MetricsSnapshot, MetricsError> {
        let snapshot = self.snapshot.load();
        Ok(pairs
            .iter()
            .filter_map(|k| snapshot.get(k).map(|m| (k.clone(), *m)))
            .collect())
    }
}
