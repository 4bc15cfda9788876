//! Utility modules for the gateway core
//!
//! - **error**: crate-level error type and `Result` alias
//! - **logging**: tracing subscriber setup

pub mod error;
pub mod logging;

pub use error::{GatewayError, Result};
pub use logging::init_tracing;

/// Truncate string to specified length with ellipsis, respecting char boundaries
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
