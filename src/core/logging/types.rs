//! Request log records
//!
//! A log entry is written in two phases: a pending row when the request
//! arrives, and an update carrying the outcome once it completes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::UnifiedFinishReason;
use crate::core::cost::{CostBreakdown, DiscountSource, TokenUsage};
use crate::core::json_healing::HealingMethod;
use crate::core::providers::ProviderId;
use crate::core::router::{AttemptRecord, ProviderScore, SelectionReason};

/// Row written synchronously at request start
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingLog {
    pub request_id: Uuid,
    pub organization_id: Option<String>,
    pub requested_model: String,
    pub requested_provider: Option<ProviderId>,
    pub streamed: bool,
    pub created_at: DateTime<Utc>,
}

impl PendingLog {
    pub fn new(requested_model: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            organization_id: None,
            requested_model: requested_model.into(),
            requested_provider: None,
            streamed: false,
            created_at: Utc::now(),
        }
    }
}

/// How the provider was chosen and what each attempt returned
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoutingMetadata {
    pub selection_reason: Option<SelectionReason>,
    pub scores: Vec<ProviderScore>,
    pub attempts: Vec<AttemptRecord>,
}

/// Outcome pushed onto the update queue when the request finishes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogUpdate {
    pub request_id: Uuid,
    pub used_model: Option<String>,
    pub used_provider: Option<ProviderId>,
    pub unified_finish_reason: UnifiedFinishReason,
    pub raw_finish_reason: Option<String>,
    pub status: u16,
    pub usage: Option<TokenUsage>,
    pub cost: Option<CostBreakdown>,
    pub discount_source: Option<DiscountSource>,
    pub healed: bool,
    pub healing_method: Option<HealingMethod>,
    pub streamed: bool,
    pub canceled: bool,
    pub error_message: Option<String>,
    pub duration_ms: u64,
    pub routing: RoutingMetadata,
    pub finished_at: DateTime<Utc>,
}

impl LogUpdate {
    /// Update with every optional field empty
    pub fn new(request_id: Uuid, unified_finish_reason: UnifiedFinishReason, status: u16) -> Self {
        Self {
            request_id,
            used_model: None,
            used_provider: None,
            unified_finish_reason,
            raw_finish_reason: None,
            status,
            usage: None,
            cost: None,
            discount_source: None,
            healed: false,
            healing_method: None,
            streamed: false,
            canceled: false,
            error_message: None,
            duration_ms: 0,
            routing: RoutingMetadata::default(),
            finished_at: Utc::now(),
        }
    }
}

/// A log row as persisted: pending until its update lands
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub pending: PendingLog,
    pub update: Option<LogUpdate>,
}

impl LogEntry {
    pub fn is_pending(&self) -> bool {
        self.update.is_none()
    }
}
