//! Configuration data models
//!
//! This module defines all configuration structures used by the routing core.

pub mod cost;
pub mod keys;
pub mod logging;
pub mod router;

pub use cost::*;
pub use keys::*;
pub use logging::*;
pub use router::*;

/// Default maximum retry attempts after the first upstream call
pub fn default_max_retries() -> u32 {
    2
}
