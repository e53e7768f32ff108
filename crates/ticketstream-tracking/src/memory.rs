//! Process-local fallback tracker.
//!
//! Mirrors the remote store's transitions on plain in-process state.
//! Created lazily on first use, torn down with the process, and never
//! replicated — cross-process queries are only served by the remote
//! backing store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::types::{BatchState, BatchStatus, DltRecord, FailureRecord};
use chrono::Utc;
use ticketstream_core::BulkErrorCode;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A poisoned lock only means a panic elsewhere; the data is still usable.
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// In-memory batch tracker.
#[derive(Debug, Default)]
pub struct InMemoryTracker {
    batches: Mutex<HashMap<String, BatchState>>,
    failures: Mutex<HashMap<String, Vec<FailureRecord>>>,
    dlt: Mutex<HashMap<String, Vec<DltRecord>>>,
}

impl InMemoryTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent batch initialization.
    pub fn initialize(
        &self,
        batch_id: &str,
        total_chunks: u32,
        total_records: u64,
        submitted_by: &str,
        source_filename: &str,
    ) {
        let mut batches = lock(&self.batches);
        batches.entry(batch_id.to_string()).or_insert_with(|| {
            BatchState::new(
                batch_id,
                total_chunks,
                total_records,
                submitted_by,
                source_filename,
            )
        });
    }

    pub fn record_success(&self, batch_id: &str) {
        self.with_live_batch(batch_id, |state| state.success_count += 1);
    }

    pub fn record_failure(&self, batch_id: &str, record: FailureRecord) {
        self.with_live_batch(batch_id, |state| state.failure_count += 1);
        lock(&self.failures)
            .entry(batch_id.to_string())
            .or_default()
            .push(record);
    }

    /// Record a skipped outcome. The record still lands on the failure
    /// list (as a duplicate entry) so clients can enumerate it, but it
    /// counts as skipped rather than failed.
    pub fn record_skipped(&self, batch_id: &str, ticket_number: &str, reason: &str) {
        self.with_live_batch(batch_id, |state| state.skipped_count += 1);
        lock(&self.failures)
            .entry(batch_id.to_string())
            .or_default()
            .push(FailureRecord::new(
                ticket_number,
                BulkErrorCode::DuplicateTicket,
                reason,
            ));
    }

    /// Mark a chunk complete; derives the terminal status when this was
    /// the last outstanding chunk.
    pub fn complete_chunk(&self, batch_id: &str, chunk_index: u32) {
        let mut batches = lock(&self.batches);
        let Some(state) = batches.get_mut(batch_id) else {
            return;
        };
        if state.status.is_terminal() {
            return;
        }
        if state.completed_chunk_indices.insert(chunk_index) {
            state.completed_chunks = state.completed_chunk_indices.len() as u32;
        }
        if state.completed_chunks >= state.total_chunks {
            state.status = state.derive_terminal();
            state.ended_at = Some(Utc::now());
        }
    }

    /// Idempotent cancel; only non-terminal batches transition.
    pub fn cancel(&self, batch_id: &str) -> bool {
        let mut batches = lock(&self.batches);
        match batches.get_mut(batch_id) {
            Some(state) if !state.status.is_terminal() => {
                state.status = BatchStatus::Cancelled;
                state.ended_at = Some(Utc::now());
                true
            }
            Some(_) => false,
            None => false,
        }
    }

    #[must_use]
    pub fn get(&self, batch_id: &str) -> Option<BatchState> {
        lock(&self.batches).get(batch_id).cloned()
    }

    #[must_use]
    pub fn list_active(&self) -> Vec<String> {
        lock(&self.batches)
            .values()
            .filter(|s| !s.status.is_terminal())
            .map(|s| s.batch_id.clone())
            .collect()
    }

    #[must_use]
    pub fn list_failures(&self, batch_id: &str, offset: usize, limit: usize) -> Vec<FailureRecord> {
        lock(&self.failures)
            .get(batch_id)
            .map(|all| all.iter().skip(offset).take(limit).cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn failure_count(&self, batch_id: &str) -> usize {
        lock(&self.failures)
            .get(batch_id)
            .map_or(0, Vec::len)
    }

    pub fn append_dlt(&self, topic: &str, record: DltRecord) {
        lock(&self.dlt)
            .entry(topic.to_string())
            .or_default()
            .push(record);
    }

    #[must_use]
    pub fn list_dlt(&self, topic: &str, limit: usize) -> Vec<DltRecord> {
        lock(&self.dlt)
            .get(topic)
            .map(|all| all.iter().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    fn with_live_batch(&self, batch_id: &str, f: impl FnOnce(&mut BatchState)) {
        let mut batches = lock(&self.batches);
        if let Some(state) = batches.get_mut(batch_id) {
            if !state.status.is_terminal() {
                f(state);
            }
        }
    }
}
