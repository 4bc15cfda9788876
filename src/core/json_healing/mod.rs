//! JSON healing for structured outputs
//!
//! Best-effort repair of model output that was asked to be JSON, plus a
//! shape check against the requested schema.

pub mod healer;
pub mod schema;

pub use healer::{HealingMethod, HealingResult, heal_json_response};
pub use schema::{SchemaValidation, validate_json_schema};
