//! Tracked batch state, failure records, and dead-letter records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use ticketstream_core::BulkErrorCode;

/// Lifecycle status of a tracked batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    /// Accepted by the submission surface, no chunk seen yet.
    Accepted,
    /// At least one chunk delivered, processing under way.
    InProgress,
    /// All chunks complete, zero failures.
    Completed,
    /// All chunks complete, failures and successes both present.
    PartiallyCompleted,
    /// All chunks complete, zero successes.
    Failed,
    /// Cancelled by a client before completion.
    Cancelled,
}

impl BatchStatus {
    /// Terminal statuses are absorbing: no field except dead-letter
    /// bookkeeping may change once one is reached.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::PartiallyCompleted | Self::Failed | Self::Cancelled
        )
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "ACCEPTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::PartiallyCompleted => "PARTIALLY_COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ACCEPTED" => Ok(Self::Accepted),
            "IN_PROGRESS" | "PROCESSING" => Ok(Self::InProgress),
            "COMPLETED" => Ok(Self::Completed),
            "PARTIALLY_COMPLETED" => Ok(Self::PartiallyCompleted),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(format!("Unknown batch status: {other}")),
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded per-record failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub ticket_number: String,
    pub error_code: BulkErrorCode,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl FailureRecord {
    pub fn new(
        ticket_number: impl Into<String>,
        error_code: BulkErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            ticket_number: ticket_number.into(),
            error_code,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A message that exhausted retries and landed on the dead-letter topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DltRecord {
    /// Topic the message was originally published to.
    pub origin_topic: String,
    /// Kafka message key.
    pub message_key: String,
    /// Payload as delivered, for later inspection.
    pub payload_snapshot: String,
    pub timestamp: DateTime<Utc>,
    pub error_message: String,
    /// Wire code of the error class that exhausted retries.
    pub error_class_tag: String,
    /// Whether this entry has been manually reprocessed.
    pub reprocessed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reprocessed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl DltRecord {
    pub fn new(
        origin_topic: impl Into<String>,
        message_key: impl Into<String>,
        payload_snapshot: impl Into<String>,
        error_message: impl Into<String>,
        error_class_tag: impl Into<String>,
    ) -> Self {
        Self {
            origin_topic: origin_topic.into(),
            message_key: message_key.into(),
            payload_snapshot: payload_snapshot.into(),
            timestamp: Utc::now(),
            error_message: error_message.into(),
            error_class_tag: error_class_tag.into(),
            reprocessed: false,
            reprocessed_at: None,
            notes: None,
        }
    }
}

/// Aggregated view of one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchState {
    pub batch_id: String,
    pub status: BatchStatus,
    pub total_chunks: u32,
    pub completed_chunks: u32,
    pub total_records: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub skipped_count: u64,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub submitted_by: String,
    pub source_filename: String,
    pub completed_chunk_indices: BTreeSet<u32>,
}

impl BatchState {
    /// Fresh in-progress state for a newly observed batch.
    pub fn new(
        batch_id: impl Into<String>,
        total_chunks: u32,
        total_records: u64,
        submitted_by: impl Into<String>,
        source_filename: impl Into<String>,
    ) -> Self {
        Self {
            batch_id: batch_id.into(),
            status: BatchStatus::InProgress,
            total_chunks,
            completed_chunks: 0,
            total_records,
            success_count: 0,
            failure_count: 0,
            skipped_count: 0,
            started_at: Utc::now(),
            ended_at: None,
            submitted_by: submitted_by.into(),
            source_filename: source_filename.into(),
            completed_chunk_indices: BTreeSet::new(),
        }
    }

    /// Derive the terminal status from the counters.
    ///
    /// Valid only when `completed_chunks >= total_chunks`. A batch is
    /// COMPLETED only when every record succeeded; skipped duplicates
    /// leave it PARTIALLY_COMPLETED alongside recorded failures.
    #[must_use]
    pub fn derive_terminal(&self) -> BatchStatus {
        if self.failure_count == 0 && self.skipped_count == 0 {
            BatchStatus::Completed
        } else if self.success_count == 0 {
            BatchStatus::Failed
        } else {
            BatchStatus::PartiallyCompleted
        }
    }

    /// Check the structural invariants of this state.
    #[must_use]
    pub fn invariants_hold(&self) -> bool {
        self.completed_chunks as usize == self.completed_chunk_indices.len()
            && self.completed_chunks <= self.total_chunks
            && self.success_count + self.failure_count + self.skipped_count <= self.total_records
            && (self.ended_at.is_some() == self.status.is_terminal())
    }
}
