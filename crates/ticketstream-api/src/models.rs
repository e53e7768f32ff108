//! Response DTOs for the bulk API.
//!
//! External field names are camelCase; internal types convert in via
//! `From` so handlers never shape JSON by hand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::csv_parser::RowError;
use ticketstream_tracking::{BatchState, DltRecord, FailureRecord};

/// 202 body returned when a submission is accepted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadAcceptedResponse {
    pub batch_id: String,
    /// Always "ACCEPTED" on this response.
    pub status: String,
    pub total_records: usize,
    pub total_chunks: u32,
    pub accepted_at: DateTime<Utc>,
    pub status_url: String,
    pub failures_url: String,
    /// Rows dropped or defaulted during parsing.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub row_errors: Vec<RowError>,
}

/// Batch status snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStatusResponse {
    pub batch_id: String,
    pub status: String,
    pub total_chunks: u32,
    pub completed_chunks: u32,
    pub total_records: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub skipped_count: u64,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub submitted_by: String,
    pub source_filename: String,
}

impl From<BatchState> for BatchStatusResponse {
    fn from(state: BatchState) -> Self {
        Self {
            batch_id: state.batch_id,
            status: state.status.as_str().to_string(),
            total_chunks: state.total_chunks,
            completed_chunks: state.completed_chunks,
            total_records: state.total_records,
            success_count: state.success_count,
            failure_count: state.failure_count,
            skipped_count: state.skipped_count,
            started_at: state.started_at,
            ended_at: state.ended_at,
            submitted_by: state.submitted_by,
            source_filename: state.source_filename,
        }
    }
}

/// One entry of a batch's failure list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureEntry {
    pub ticket_number: String,
    pub error_code: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl From<FailureRecord> for FailureEntry {
    fn from(record: FailureRecord) -> Self {
        Self {
            ticket_number: record.ticket_number,
            error_code: record.error_code.code().to_string(),
            message: record.message,
            timestamp: record.timestamp,
        }
    }
}

/// Paginated failure list for a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailuresResponse {
    pub batch_id: String,
    pub total_failures: usize,
    pub page: usize,
    pub page_size: usize,
    pub failures: Vec<FailureEntry>,
}

/// Snapshot of all in-flight batches.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveBatchesResponse {
    pub count: usize,
    pub batches: Vec<BatchStatusResponse>,
    pub timestamp: DateTime<Utc>,
}

/// Result of an advisory cancel request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub batch_id: String,
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub cancelled_at: DateTime<Utc>,
    pub message: String,
}

/// Dead-letter list snapshot for one topic.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DltMessagesResponse {
    pub topic: String,
    pub returned_messages: usize,
    pub messages: Vec<DltRecord>,
    pub retrieved_at: DateTime<Utc>,
}

/// Query parameters for the failures endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct FailuresParams {
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub size: usize,
}

fn default_page_size() -> usize {
    50
}

/// Query parameters for the cancel endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CancelParams {
    pub reason: Option<String>,
}

/// Query parameters for the DLT endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DltParams {
    pub topic: Option<String>,
    #[serde(default = "default_dlt_limit")]
    pub limit: usize,
}

fn default_dlt_limit() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticketstream_core::BulkErrorCode;
    use ticketstream_tracking::BatchStatus;

    #[test]
    fn test_status_response_from_state() {
        let mut state = BatchState::new("BATCH-1", 4, 350, "alice", "tickets.csv");
        state.success_count = 350;
        state.status = BatchStatus::Completed;
        state.ended_at = Some(Utc::now());

        let response = BatchStatusResponse::from(state);
        assert_eq!(response.status, "COMPLETED");
        assert_eq!(response.total_records, 350);
        assert_eq!(response.submitted_by, "alice");

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("batchId").is_some());
        assert!(json.get("successCount").is_some());
        assert!(json.get("endedAt").is_some());
    }

    #[test]
    fn test_failure_entry_carries_code_string() {
        let entry = FailureEntry::from(FailureRecord::new(
            "TKT-1",
            BulkErrorCode::DuplicateTicket,
            "Duplicate ticket number",
        ));
        assert_eq!(entry.error_code, "P2001");
    }

    #[test]
    fn test_params_defaults() {
        let params: FailuresParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.page, 0);
        assert_eq!(params.size, 50);

        let params: DltParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.limit, 100);
        assert!(params.topic.is_none());
    }
}
