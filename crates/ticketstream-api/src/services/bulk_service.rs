//! Upload orchestration and the read-only query facade.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::models::{
    ActiveBatchesResponse, BatchFailuresResponse, BatchStatusResponse, CancelResponse,
    DltMessagesResponse, FailureEntry, UploadAcceptedResponse,
};
use crate::services::csv_parser::{self, ParseError};
use chrono::Utc;
use ticketstream_core::{BulkConfig, TicketRecord};
use ticketstream_events::{BatchSubmission, BulkProducer, EventError, TopicConfig};
use ticketstream_tracking::TrackingStore;

/// Seam over the chunk producer so the orchestrator can be exercised
/// without a broker.
#[async_trait]
pub trait ChunkPublisher: Send + Sync {
    async fn publish_batch(
        &self,
        records: Vec<TicketRecord>,
        submitted_by: &str,
        source_filename: &str,
    ) -> Result<BatchSubmission, EventError>;
}

#[async_trait]
impl ChunkPublisher for BulkProducer {
    async fn publish_batch(
        &self,
        records: Vec<TicketRecord>,
        submitted_by: &str,
        source_filename: &str,
    ) -> Result<BatchSubmission, EventError> {
        BulkProducer::publish_batch(self, records, submitted_by, source_filename).await
    }
}

/// Composes parser and producer for submissions and shapes tracking
/// snapshots for queries.
pub struct BulkUploadService {
    publisher: Arc<dyn ChunkPublisher>,
    tracking: Arc<TrackingStore>,
    topics: TopicConfig,
    cfg: BulkConfig,
}

impl BulkUploadService {
    #[must_use]
    pub fn new(
        publisher: Arc<dyn ChunkPublisher>,
        tracking: Arc<TrackingStore>,
        topics: TopicConfig,
        cfg: BulkConfig,
    ) -> Self {
        Self {
            publisher,
            tracking,
            topics,
            cfg,
        }
    }

    /// Validate a submission and hand its chunks to the durable log.
    ///
    /// Returns as soon as the chunks are queued; clients poll the status
    /// surface for progress.
    pub async fn upload(
        &self,
        filename: &str,
        data: &[u8],
        uploaded_by: &str,
    ) -> Result<UploadAcceptedResponse, ApiError> {
        info!(
            filename,
            size = data.len(),
            uploaded_by,
            "Bulk upload received"
        );

        let outcome = csv_parser::parse_submission(filename, data, &self.cfg)?;
        if outcome.records.is_empty() {
            // Rows may all have been dropped by validation; an accepted
            // set of zero never reaches the producer.
            warn!(filename, rows_seen = outcome.rows_seen, "No valid records in submission");
            return Err(ApiError::Parse(ParseError::EmptyFile));
        }

        let submission = self
            .publisher
            .publish_batch(outcome.records, uploaded_by, filename)
            .await
            .map_err(ApiError::Producer)?;

        info!(
            batch_id = %submission.batch_id,
            total_records = submission.total_records,
            total_chunks = submission.total_chunks,
            "Bulk upload accepted"
        );

        Ok(UploadAcceptedResponse {
            batch_id: submission.batch_id.clone(),
            status: "ACCEPTED".to_string(),
            total_records: submission.total_records,
            total_chunks: submission.total_chunks,
            accepted_at: Utc::now(),
            status_url: format!("/api/tickets/bulk/status/{}", submission.batch_id),
            failures_url: format!("/api/tickets/bulk/failures/{}", submission.batch_id),
            row_errors: outcome.row_errors,
        })
    }

    /// Point-in-time status snapshot for a batch.
    ///
    /// The externally visible status is taken from stored fields, never
    /// recomputed from the chunk list.
    pub async fn batch_status(&self, batch_id: &str) -> Result<BatchStatusResponse, ApiError> {
        self.tracking
            .get(batch_id)
            .await
            .map(BatchStatusResponse::from)
            .ok_or_else(|| ApiError::BatchNotFound {
                batch_id: batch_id.to_string(),
            })
    }

    /// Paginated failure list for a batch.
    pub async fn batch_failures(
        &self,
        batch_id: &str,
        page: usize,
        size: usize,
    ) -> BatchFailuresResponse {
        let size = size.clamp(1, 500);
        let (failures, total) = self
            .tracking
            .list_failures(batch_id, page.saturating_mul(size), size)
            .await;
        BatchFailuresResponse {
            batch_id: batch_id.to_string(),
            total_failures: total,
            page,
            page_size: size,
            failures: failures.into_iter().map(FailureEntry::from).collect(),
        }
    }

    /// Status snapshots for every in-flight batch.
    pub async fn active_batches(&self) -> ActiveBatchesResponse {
        let ids = self.tracking.list_active().await;
        let mut batches = Vec::with_capacity(ids.len());
        for batch_id in &ids {
            if let Some(state) = self.tracking.get(batch_id).await {
                batches.push(BatchStatusResponse::from(state));
            }
        }
        ActiveBatchesResponse {
            count: batches.len(),
            batches,
            timestamp: Utc::now(),
        }
    }

    /// Advisory cancellation: workers poll the flag at chunk entry, so
    /// in-flight records are not interrupted.
    pub async fn cancel(&self, batch_id: &str, reason: Option<&str>) -> CancelResponse {
        let cancelled = self.tracking.cancel(batch_id, reason).await;
        CancelResponse {
            batch_id: batch_id.to_string(),
            cancelled,
            reason: reason.map(str::to_string),
            cancelled_at: Utc::now(),
            message: if cancelled {
                "Batch marked for cancellation".to_string()
            } else {
                "Unable to cancel batch - may already be complete".to_string()
            },
        }
    }

    /// Snapshot of a topic's dead-letter list.
    pub async fn dlt_messages(&self, topic: Option<&str>, limit: usize) -> DltMessagesResponse {
        let default_topic = self.topics.dlt_topic();
        let topic = topic.unwrap_or(default_topic.as_str());
        let messages = self.tracking.list_dlt(topic, limit.clamp(1, 1000)).await;
        DltMessagesResponse {
            topic: topic.to_string(),
            returned_messages: messages.len(),
            messages,
            retrieved_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use ticketstream_core::BulkErrorCode;

    /// Captures published batches instead of talking to a broker.
    struct CapturePublisher {
        batches: Mutex<Vec<(Vec<TicketRecord>, String, String)>>,
        fail: bool,
    }

    impl CapturePublisher {
        fn new(fail: bool) -> Self {
            Self {
                batches: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl ChunkPublisher for CapturePublisher {
        async fn publish_batch(
            &self,
            records: Vec<TicketRecord>,
            submitted_by: &str,
            source_filename: &str,
        ) -> Result<BatchSubmission, EventError> {
            if self.fail {
                return Err(EventError::AllChunksFailed {
                    batch_id: "BATCH-TEST".to_string(),
                    total_chunks: 1,
                });
            }
            let total_records = records.len();
            let total_chunks = total_records.div_ceil(100) as u32;
            self.batches.lock().unwrap().push((
                records,
                submitted_by.to_string(),
                source_filename.to_string(),
            ));
            Ok(BatchSubmission {
                batch_id: "BATCH-TEST".to_string(),
                total_records,
                total_chunks,
            })
        }
    }

    fn service(fail_publish: bool) -> (Arc<CapturePublisher>, BulkUploadService) {
        let publisher = Arc::new(CapturePublisher::new(fail_publish));
        let service = BulkUploadService::new(
            publisher.clone(),
            Arc::new(TrackingStore::in_memory(3600, 3600)),
            TopicConfig::default(),
            BulkConfig::default(),
        );
        (publisher, service)
    }

    const CSV: &str = "ticketnumber,title,customerid\n\
                       TKT-001,Login,1001\n\
                       TKT-002,Reset,1002\n\
                       TKT-003,Dash,1003\n";

    #[tokio::test]
    async fn test_upload_accepted() {
        let (publisher, service) = service(false);
        let response = service
            .upload("tickets.csv", CSV.as_bytes(), "system")
            .await
            .unwrap();
        assert_eq!(response.status, "ACCEPTED");
        assert_eq!(response.total_records, 3);
        assert_eq!(response.total_chunks, 1);
        assert!(response.status_url.ends_with("/status/BATCH-TEST"));

        let captured = publisher.batches.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].1, "system");
        assert_eq!(captured[0].2, "tickets.csv");
    }

    #[tokio::test]
    async fn test_upload_with_dropped_row_reports_errors() {
        let (_, service) = service(false);
        let csv = "ticketnumber,title,customerid\n\
                   TKT-001,Login,1001\n\
                   TKT-002,Reset,abc\n\
                   TKT-003,Dash,1003\n";
        let response = service
            .upload("tickets.csv", csv.as_bytes(), "system")
            .await
            .unwrap();
        assert_eq!(response.total_records, 2);
        assert_eq!(response.row_errors.len(), 1);
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_accept_set() {
        let (_, service) = service(false);
        let csv = "ticketnumber,title,customerid\n,Login,1001\n";
        let err = service
            .upload("tickets.csv", csv.as_bytes(), "system")
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), BulkErrorCode::EmptyFile);
    }

    #[tokio::test]
    async fn test_upload_surfaces_producer_failure() {
        let (_, service) = service(true);
        let err = service
            .upload("tickets.csv", CSV.as_bytes(), "system")
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), BulkErrorCode::KafkaProducerError);
        assert!(err.retryable());
    }

    #[tokio::test]
    async fn test_status_not_found() {
        let (_, service) = service(false);
        let err = service.batch_status("BATCH-NOPE").await.unwrap_err();
        assert!(matches!(err, ApiError::BatchNotFound { .. }));
    }

    #[tokio::test]
    async fn test_cancel_advisory_response() {
        let (_, service) = service(false);
        service
            .tracking
            .initialize("BATCH-X", 2, 10, "system", "a.csv")
            .await;
        let response = service.cancel("BATCH-X", Some("typo in file")).await;
        assert!(response.cancelled);
        let again = service.cancel("BATCH-X", None).await;
        assert!(!again.cancelled);
    }

    #[tokio::test]
    async fn test_dlt_defaults_to_main_dlt_topic() {
        let (_, service) = service(false);
        let response = service.dlt_messages(None, 100).await;
        assert_eq!(response.topic, "ticket.bulk.requests.DLT");
        assert_eq!(response.returned_messages, 0);
    }
}
