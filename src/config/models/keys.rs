//! Pooled credential health settings

use serde::{Deserialize, Serialize};

/// Thresholds for the key health tracker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyHealthSettings {
    /// Consecutive non-401 errors before a key is avoided
    #[serde(default = "default_degraded_error_threshold")]
    pub degraded_error_threshold: u32,
    /// Errors older than this no longer count towards the threshold
    #[serde(default = "default_error_window_secs")]
    pub error_window_secs: u64,
}

impl Default for KeyHealthSettings {
    fn default() -> Self {
        Self {
            degraded_error_threshold: default_degraded_error_threshold(),
            error_window_secs: default_error_window_secs(),
        }
    }
}

fn default_degraded_error_threshold() -> u32 {
    3
}

fn default_error_window_secs() -> u64 {
    300
}
