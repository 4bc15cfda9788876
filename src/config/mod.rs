//! Configuration management for the gateway core
//!
//! This module handles loading, validation, and management of routing configuration.

pub mod models;
pub mod validation;

pub use models::*;
pub use validation::Validate;

use crate::utils::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Main configuration struct for the gateway core
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Provider selection and retry
    #[serde(default)]
    pub router: RouterSettings,
    /// Pooled credential health
    #[serde(default)]
    pub keys: KeyHealthSettings,
    /// Cost metering and discounts
    #[serde(default)]
    pub cost: CostSettings,
    /// Tracing output
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Async request log queue
    #[serde(default)]
    pub log_queue: LogQueueConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {:?}", path);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GatewayError::Config(format!("Failed to read config file: {}", e)))?;

        let config = Self::from_yaml_str(&content)?;
        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| GatewayError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables on top of defaults.
    ///
    /// Reads a `.env` file first when present.
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");
        let _ = dotenvy::dotenv();

        let mut config = Self::default();

        if let Ok(rate) = std::env::var("LLMGATEWAY_EXPLORATION_RATE") {
            config.router.exploration_rate = rate.parse().map_err(|e| {
                GatewayError::Config(format!("Invalid LLMGATEWAY_EXPLORATION_RATE: {}", e))
            })?;
        }
        if let Ok(retries) = std::env::var("LLMGATEWAY_MAX_RETRIES") {
            config.router.max_retries = retries.parse().map_err(|e| {
                GatewayError::Config(format!("Invalid LLMGATEWAY_MAX_RETRIES: {}", e))
            })?;
        }
        if let Ok(level) = std::env::var("LLMGATEWAY_LOG_LEVEL") {
            config.logging.level = level;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        debug!("Validating configuration");

        self.router
            .validate()
            .map_err(|e| GatewayError::Config(format!("Router config error: {}", e)))?;
        self.keys
            .validate()
            .map_err(|e| GatewayError::Config(format!("Keys config error: {}", e)))?;
        self.cost
            .validate()
            .map_err(|e| GatewayError::Config(format!("Cost config error: {}", e)))?;
        self.log_queue
            .validate()
            .map_err(|e| GatewayError::Config(format!("Log queue config error: {}", e)))?;

        Ok(())
    }

    /// Convert to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| GatewayError::Config(format!("Failed to serialize config to YAML: {}", e)))
    }
}
