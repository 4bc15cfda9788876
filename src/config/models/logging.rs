//! Logging configuration

use serde::{Deserialize, Serialize};

/// Tracing subscriber configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. `info` or `llmgateway_core=debug`
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,
    #[serde(default)]
    pub with_target: bool,
    #[serde(default)]
    pub with_thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
            with_target: false,
            with_thread_ids: false,
        }
    }
}

/// Request log queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogQueueConfig {
    /// Capacity of the bounded "log update" channel
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for LogQueueConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_buffer_size() -> usize {
    10_000
}
