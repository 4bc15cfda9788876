//! # llmgateway-core
//!
//! Request routing and resilience core of a multi-provider LLM gateway.
//!
//! ## Features
//!
//! - **Provider Selection**: weighted scoring over price, uptime, throughput and
//!   latency with epsilon-greedy exploration
//! - **Retry and Fallback**: bounded, sequential retries across alternate providers
//! - **Key Rotation**: round-robin credential pools with health tracking and blacklisting
//! - **Request Context**: per-provider URLs, auth headers and request bodies
//! - **Cost Metering**: exact decimal cost under a layered discount system
//! - **JSON Healing**: repair of malformed structured outputs
//! - **Request Logs**: two-phase log entries with unified finish reasons
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use llmgateway_core::{Config, GatewayCall, RoutingCore};
//! use llmgateway_core::core::types::{ChatMessage, ChatRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let core = RoutingCore::builder(Config::from_env()?).build()?;
//!
//!     let request = ChatRequest::new("gpt-4o", vec![ChatMessage::user("Hello!")]);
//!     let response = core.route(GatewayCall::new(request)).await?;
//!     println!("{} answered: {}", response.provider, response.content);
//!
//!     core.shutdown().await;
//!     Ok(())
//! }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod config;
pub mod core;
pub mod utils;

// Re-export main types
pub use config::Config;
pub use utils::error::{GatewayError, Result};

pub use core::catalog::{AllowedProviders, Catalog, ModelDefinition, ProviderModelMapping};
pub use core::gateway::{GatewayCall, RouteFailure, RoutedResponse, RoutingCore};
pub use core::json_healing::{HealingResult, heal_json_response};
pub use core::logging::UnifiedFinishReason;
pub use core::providers::{ProviderError, ProviderId};
pub use core::router::{ProviderSelection, ProviderSelector, RouterError, SelectionReason};

// Version information
/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
        assert_eq!(NAME, "llmgateway-core");
    }
}
