//! Integration tests for llmgateway-core
//!
//! These tests exercise the routing core through its public API against
//! mock upstream providers.

pub mod config_tests;
pub mod routing_flow_tests;
