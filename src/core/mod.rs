//! Core functionality of the gateway
//!
//! This module contains the routing and resilience logic and its data structures.
//!
//! ## Module Structure
//! - `catalog`: models, provider mappings, pricing
//! - `metrics`: provider metrics read path
//! - `router`: provider selection and the retry/fallback attempt loop
//! - `keys`: pooled credential rotation and health
//! - `providers`: per-provider request context, bodies and transport
//! - `cost`: discounts and cost calculation
//! - `json_healing`: structured output repair
//! - `logging`: two-phase request logs
//! - `gateway`: the facade tying them together

pub mod catalog;
pub mod cost;
pub mod gateway;
pub mod json_healing;
pub mod keys;
pub mod logging;
pub mod metrics;
pub mod providers;
pub mod router;
pub mod types;

pub use gateway::{GatewayCall, RouteFailure, RoutedResponse, RoutingCore, RoutingCoreBuilder};
