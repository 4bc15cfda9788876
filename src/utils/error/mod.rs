//! Error handling utilities

pub mod error;

pub use error::{GatewayError, Result};
