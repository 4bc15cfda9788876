//! Tracing subscriber setup
//!
//! Library code logs through `tracing` macros only; binaries call
//! [`init_tracing`] once at startup.

use crate::config::LoggingConfig;
use crate::utils::error::{GatewayError, Result};
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber.
///
/// `RUST_LOG` overrides the configured level. Calling this twice is harmless:
/// the second install fails and is reported as `Ok(false)`.
pub fn init_tracing(config: &LoggingConfig) -> Result<bool> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| GatewayError::Config(format!("Invalid log level '{}': {}", config.level, e)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target)
        .with_thread_ids(config.with_thread_ids);

    let installed = if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    Ok(installed)
}
