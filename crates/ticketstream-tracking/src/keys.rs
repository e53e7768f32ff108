//! Tracking store keyspace.
//!
//! The namespace is shared by every process that tracks batches, so the
//! exact key shapes are part of the cross-process contract:
//!
//! - `bulk:batch:status:{batchId}` — hash of batch fields and counters
//! - `bulk:batch:progress:{batchId}` — set of completed chunk indices
//! - `bulk:batch:failures:{batchId}` — list of serialized failure records
//! - `bulk:active-batches` — set of in-flight batch ids
//! - `bulk:dlt:{topic}` — list of serialized dead-letter records

/// Set of batch ids that are currently in flight.
pub const ACTIVE_BATCHES: &str = "bulk:active-batches";

/// Hash holding a batch's fields and counters.
#[must_use]
pub fn batch_status(batch_id: &str) -> String {
    format!("bulk:batch:status:{batch_id}")
}

/// Set of completed chunk indices for a batch.
#[must_use]
pub fn batch_progress(batch_id: &str) -> String {
    format!("bulk:batch:progress:{batch_id}")
}

/// List of failure records for a batch, in insertion order.
#[must_use]
pub fn batch_failures(batch_id: &str) -> String {
    format!("bulk:batch:failures:{batch_id}")
}

/// List of dead-letter records for a topic, in insertion order.
#[must_use]
pub fn dlt_list(topic: &str) -> String {
    format!("bulk:dlt:{topic}")
}
