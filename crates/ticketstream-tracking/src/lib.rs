//! # ticketstream-tracking
//!
//! Distributed tracking store for bulk batches.
//!
//! Aggregates per-chunk outcomes into a queryable batch view keyed by
//! batch id: counters, completed-chunk set, failure list, lifecycle
//! timestamps, cancellation flag, and a per-topic dead-letter list.
//!
//! The backing store is Redis; every process also keeps a private
//! in-memory tracker used when Redis is unreachable. The fallback is a
//! degradation, not a guarantee — it is never replicated across
//! processes. Tracking failures are logged and swallowed so that an
//! outage here can never block ticket creation.

pub mod keys;
pub mod memory;
pub mod store;
pub mod types;

pub use memory::InMemoryTracker;
pub use store::{TrackingError, TrackingStore};
pub use types::{BatchState, BatchStatus, DltRecord, FailureRecord};
