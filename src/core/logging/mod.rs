//! Request logging
//!
//! ## Module Structure
//! - `finish_reason`: unified finish reason and provider vocabularies
//! - `types`: pending rows and their updates
//! - `writer`: sink trait and the queued writer

pub mod finish_reason;
pub mod types;
pub mod writer;

pub use finish_reason::{UnifiedFinishReason, unify_finish_reason};
pub use types::{LogEntry, LogUpdate, PendingLog, RoutingMetadata};
pub use writer::{InMemoryLogSink, LogError, LogSink, LogWriter};
