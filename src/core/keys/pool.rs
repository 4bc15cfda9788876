//! Round-robin rotation over pooled credentials with per-key health

use super::KeyError;
use crate::config::KeyHealthSettings;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Split a comma-separated variable, trimming entries and dropping empties
pub fn parse_comma_separated_env(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Position-aligned auxiliary value (region, resource, ...) for key `index`
///
/// Out-of-range indices clamp to the last entry so a shorter auxiliary list
/// is tolerated. Empty input yields `default`, or an error without one.
pub fn get_nth_value(
    env_value: Option<&str>,
    index: usize,
    default: Option<&str>,
) -> Result<String, KeyError> {
    let values = env_value.map(parse_comma_separated_env).unwrap_or_default();
    match values.len() {
        0 => default.map(str::to_string).ok_or(KeyError::NoValue),
        n => Ok(values[index.min(n - 1)].clone()),
    }
}

/// A credential picked by rotation and the position it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundRobinValue {
    pub value: String,
    pub index: usize,
}

/// Health tracker thresholds
#[derive(Debug, Clone, Copy)]
pub struct KeyHealthConfig {
    /// Consecutive non-401 errors before a key is avoided
    pub degraded_error_threshold: u32,
    /// Errors further apart than this restart the consecutive count
    pub error_window: Duration,
}

impl Default for KeyHealthConfig {
    fn default() -> Self {
        Self::from(&KeyHealthSettings::default())
    }
}

impl From<&KeyHealthSettings> for KeyHealthConfig {
    fn from(settings: &KeyHealthSettings) -> Self {
        Self {
            degraded_error_threshold: settings.degraded_error_threshold,
            error_window: Duration::from_secs(settings.error_window_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
    Healthy,
    Degraded,
    Blacklisted,
}

#[derive(Debug, Clone, Default)]
struct KeyHealth {
    consecutive_errors: u32,
    last_error_at: Option<Instant>,
    blacklisted: bool,
}

impl KeyHealth {
    fn within_window(&self, window: Duration) -> bool {
        self.last_error_at
            .map(|at| at.elapsed() < window)
            .unwrap_or(false)
    }

    fn state(&self, config: &KeyHealthConfig) -> KeyState {
        if self.blacklisted {
            KeyState::Blacklisted
        } else if self.consecutive_errors >= config.degraded_error_threshold
            && self.within_window(config.error_window)
        {
            KeyState::Degraded
        } else {
            KeyState::Healthy
        }
    }
}

/// Observability view of one tracked key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyHealthSnapshot {
    pub env_var: String,
    pub index: usize,
    pub state: KeyState,
    pub consecutive_errors: u32,
}

/// Rotation counters and health records, shared by all requests of an instance
#[derive(Debug, Default)]
pub struct KeyPool {
    config: KeyHealthConfig,
    counters: DashMap<String, AtomicUsize>,
    health: DashMap<(String, usize), KeyHealth>,
}

impl KeyPool {
    pub fn new(config: KeyHealthConfig) -> Self {
        Self {
            config,
            counters: DashMap::new(),
            health: DashMap::new(),
        }
    }

    pub fn config(&self) -> &KeyHealthConfig {
        &self.config
    }

    /// Next credential of `env_var`, skipping unhealthy indices
    ///
    /// When every index is unhealthy the plain rotation index is returned.
    pub fn get_round_robin_value(
        &self,
        env_var: &str,
        env_value: &str,
    ) -> Result<RoundRobinValue, KeyError> {
        let values = parse_comma_separated_env(env_value);
        let n = values.len();
        if n == 0 {
            return Err(KeyError::Empty(env_var.to_string()));
        }
        if n == 1 {
            return Ok(RoundRobinValue {
                value: values[0].clone(),
                index: 0,
            });
        }

        let counter = self
            .counters
            .entry(env_var.to_string())
            .or_insert_with(|| AtomicUsize::new(0));
        let start = counter.fetch_add(1, Relaxed);

        for offset in 0..n {
            let index = (start + offset) % n;
            if self.is_key_healthy(env_var, index) {
                if offset > 0 {
                    // Keep the rotation moving past the skipped keys
                    counter.fetch_add(offset, Relaxed);
                }
                return Ok(RoundRobinValue {
                    value: values[index].clone(),
                    index,
                });
            }
        }

        let index = start % n;
        warn!(env_var, index, "all pooled keys unhealthy, using unfiltered rotation");
        Ok(RoundRobinValue {
            value: values[index].clone(),
            index,
        })
    }

    /// Record a failed call made with key `index`; status 0 means no response
    pub fn report_key_error(&self, env_var: &str, index: usize, status: u16) {
        let mut health = self.health.entry((env_var.to_string(), index)).or_default();

        if status == 401 {
            if !health.blacklisted {
                warn!(env_var, index, "credential rejected with 401, blacklisting key");
            }
            health.blacklisted = true;
            return;
        }

        if !health.within_window(self.config.error_window) {
            health.consecutive_errors = 0;
        }
        health.consecutive_errors += 1;
        health.last_error_at = Some(Instant::now());

        if health.consecutive_errors == self.config.degraded_error_threshold {
            warn!(
                env_var,
                index,
                errors = health.consecutive_errors,
                "pooled key degraded"
            );
        } else {
            debug!(env_var, index, status, errors = health.consecutive_errors, "key error recorded");
        }
    }

    /// A success clears the error streak but never a blacklist
    pub fn report_key_success(&self, env_var: &str, index: usize) {
        if let Some(mut health) = self.health.get_mut(&(env_var.to_string(), index)) {
            health.consecutive_errors = 0;
            health.last_error_at = None;
        }
    }

    pub fn key_state(&self, env_var: &str, index: usize) -> KeyState {
        self.health
            .get(&(env_var.to_string(), index))
            .map(|h| h.state(&self.config))
            .unwrap_or(KeyState::Healthy)
    }

    pub fn is_key_healthy(&self, env_var: &str, index: usize) -> bool {
        self.key_state(env_var, index) == KeyState::Healthy
    }

    /// Whether `env_value` has a healthy key other than `exclude`
    pub fn has_healthy_alternative(&self, env_var: &str, env_value: &str, exclude: usize) -> bool {
        let n = parse_comma_separated_env(env_value).len();
        (0..n).any(|i| i != exclude && self.is_key_healthy(env_var, i))
    }

    /// Forget every counter and health record
    pub fn reset_key_health(&self) {
        self.counters.clear();
        self.health.clear();
    }

    pub fn health_snapshot(&self) -> Vec<KeyHealthSnapshot> {
        let mut snapshot: Vec<KeyHealthSnapshot> = self
            .health
            .iter()
            .map(|entry| {
                let (env_var, index) = entry.key();
                KeyHealthSnapshot {
                    env_var: env_var.clone(),
                    index: *index,
                    state: entry.value().state(&self.config),
                    consecutive_errors: entry.value().consecutive_errors,
                }
            })
            .collect();
        snapshot.sort_by(|a, b| (&a.env_var, a.index).cmp(&(&b.env_var, b.index)));
        snapshot
    }
}
