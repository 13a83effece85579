//! Audit Trail Module
//!
//! Fire-and-forget operation logging through a bounded drop-oldest queue.

mod entry;
mod queue;
mod service;
mod sink;

pub use entry::AuditEntry;
pub use queue::AuditQueue;
pub use service::{AuditSettings, AuditStats, AuditTrailService};
pub use sink::{AuditSink, JsonLinesSink, MemorySink};
