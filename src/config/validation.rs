//! Configuration validation

use super::models::*;
use tracing::debug;

/// Validation trait for configuration structures
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

fn check_unit_interval(name: &str, value: f64) -> Result<(), String> {
    if !(0.0..=1.0).contains(&value) || value.is_nan() {
        return Err(format!("{} must be within [0, 1], got {}", name, value));
    }
    Ok(())
}

impl Validate for RouterSettings {
    fn validate(&self) -> Result<(), String> {
        debug!("Validating router configuration");

        check_unit_interval("exploration_rate", self.exploration_rate)?;

        if self.metrics_window_minutes == 0 {
            return Err("metrics_window_minutes must be greater than 0".to_string());
        }
        if self.upstream_timeout_secs == 0 {
            return Err("upstream_timeout_secs must be greater than 0".to_string());
        }

        self.weights.validate()?;
        self.defaults.validate()?;
        Ok(())
    }
}

impl Validate for ScoringWeights {
    fn validate(&self) -> Result<(), String> {
        for (name, weight) in [
            ("price", self.price),
            ("uptime", self.uptime),
            ("throughput", self.throughput),
            ("latency", self.latency),
        ] {
            check_unit_interval(&format!("weights.{}", name), weight)?;
        }

        if (self.sum() - 1.0).abs() > 1e-6 {
            return Err(format!("Scoring weights must sum to 1, got {}", self.sum()));
        }
        Ok(())
    }
}

impl Validate for MetricDefaults {
    fn validate(&self) -> Result<(), String> {
        if !(0.0..=100.0).contains(&self.uptime) {
            return Err(format!("Default uptime must be a percentage, got {}", self.uptime));
        }
        if self.latency_ms < 0.0 || self.throughput < 0.0 {
            return Err("Default latency and throughput must not be negative".to_string());
        }
        Ok(())
    }
}

impl Validate for KeyHealthSettings {
    fn validate(&self) -> Result<(), String> {
        if self.degraded_error_threshold == 0 {
            return Err("degraded_error_threshold must be greater than 0".to_string());
        }
        if self.error_window_secs == 0 {
            return Err("error_window_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Validate for CostSettings {
    fn validate(&self) -> Result<(), String> {
        if self.data_storage_cost_per_million_tokens.is_sign_negative() {
            return Err("data_storage_cost_per_million_tokens must not be negative".to_string());
        }
        if self.discount_cache_capacity == 0 {
            return Err("discount_cache_capacity must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Validate for LogQueueConfig {
    fn validate(&self) -> Result<(), String> {
        if self.buffer_size == 0 {
            return Err("log_queue.buffer_size must be greater than 0".to_string());
        }
        Ok(())
    }
}
