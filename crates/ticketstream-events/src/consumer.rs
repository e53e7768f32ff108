//! Chunk consumer worker pool.
//!
//! Workers subscribe to the main topic under the shared `bulk-consumers`
//! group with auto-commit disabled; the consumer-group protocol spreads
//! partitions over workers and processes, so no local coordination is
//! needed beyond the rebalancing contract.
//!
//! Per-chunk lifecycle: validate the envelope, initialize tracking
//! (tolerating tracking outages), honor advisory cancellation, process
//! records strictly in index order with per-record failure isolation,
//! record the chunk completion, then acknowledge. A failure that escapes
//! the per-record handlers aborts the chunk and runs through the retry
//! policy; exhausted or non-retryable aborts are dead-lettered.

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{KafkaConfig, TopicConfig};
use crate::dlt::DltPublisher;
use crate::envelope::BulkChunkEvent;
use crate::error::EventError;
use crate::retry::RetryPolicy;
use ticketstream_core::{BulkConfig, BulkErrorCode};
use ticketstream_ticketing::{ProcessorError, RecordProcessor};
use ticketstream_tracking::{BatchStatus, TrackingStore};

/// Outcome counters for one processed chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    /// The chunk was skipped because its batch was cancelled.
    pub cancelled: bool,
}

/// A failure that aborted chunk processing.
#[derive(Debug, Clone)]
pub struct ChunkError {
    pub code: BulkErrorCode,
    pub message: String,
}

impl ChunkError {
    fn new(code: BulkErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

/// Drives the per-chunk state machine against the record processor and
/// the tracking store. Free of any transport concern, so the same logic
/// runs under the Kafka workers and under tests.
pub struct ChunkProcessor {
    processor: Arc<dyn RecordProcessor>,
    tracking: Arc<TrackingStore>,
}

impl ChunkProcessor {
    #[must_use]
    pub fn new(processor: Arc<dyn RecordProcessor>, tracking: Arc<TrackingStore>) -> Self {
        Self {
            processor,
            tracking,
        }
    }

    /// Process one validated chunk.
    ///
    /// Records are isolated: a classified failure on one record never
    /// aborts the chunk. Only errors the classification table marks as
    /// retryable-unknown escape as [`ChunkError`].
    pub async fn process(&self, event: &BulkChunkEvent) -> Result<ChunkOutcome, ChunkError> {
        let batch_id = &event.batch_id;

        // Tracking unavailability must not block processing; the store
        // degrades internally.
        self.tracking
            .initialize(
                batch_id,
                event.total_chunks,
                event.total_records,
                &event.submitted_by,
                &event.source_filename,
            )
            .await;

        // Advisory cancellation check: racy by design, in-flight records
        // are never interrupted.
        if let Some(state) = self.tracking.get(batch_id).await {
            if state.status == BatchStatus::Cancelled {
                warn!(batch_id, chunk_index = event.chunk_index, "Batch cancelled, skipping chunk");
                return Ok(ChunkOutcome {
                    cancelled: true,
                    ..ChunkOutcome::default()
                });
            }
        }

        let mut outcome = ChunkOutcome::default();
        for record in &event.records {
            let ticket_number = record.ticket_number.as_str();
            match self.processor.create_ticket(record).await {
                Ok(_) => {
                    outcome.succeeded += 1;
                    self.tracking.record_success(batch_id, ticket_number).await;
                }
                Err(ProcessorError::Duplicate { .. }) => {
                    debug!(batch_id, ticket_number, "Duplicate skipped");
                    outcome.skipped += 1;
                    self.tracking
                        .record_skipped(batch_id, ticket_number, "Duplicate ticket number")
                        .await;
                }
                Err(err @ ProcessorError::NullRequest)
                | Err(err @ ProcessorError::InvalidRow { .. })
                | Err(err @ ProcessorError::InvalidStatusTransition { .. }) => {
                    warn!(batch_id, ticket_number, error = %err, "Record validation failed");
                    outcome.failed += 1;
                    self.tracking
                        .record_failure(batch_id, ticket_number, err.error_code(), &err.to_string())
                        .await;
                }
                Err(err @ ProcessorError::DataIntegrity { .. }) => {
                    warn!(batch_id, ticket_number, error = %err, "Constraint rejected record");
                    outcome.failed += 1;
                    self.tracking
                        .record_failure(
                            batch_id,
                            ticket_number,
                            BulkErrorCode::DuplicateTicket,
                            &err.to_string(),
                        )
                        .await;
                }
                Err(err @ ProcessorError::Database { .. }) => {
                    error!(batch_id, ticket_number, error = %err, "Database error on record");
                    outcome.failed += 1;
                    self.tracking
                        .record_failure(
                            batch_id,
                            ticket_number,
                            BulkErrorCode::DatabaseError,
                            &err.to_string(),
                        )
                        .await;
                }
                Err(err) => {
                    let code = err.error_code();
                    if code.is_retryable() {
                        // Unexpected retryable failure: abort the chunk and
                        // let the retry controller take over.
                        return Err(ChunkError::new(code, err.to_string()));
                    }
                    error!(batch_id, ticket_number, code = code.code(), error = %err, "Unexpected record error");
                    outcome.failed += 1;
                    self.tracking
                        .record_failure(
                            batch_id,
                            ticket_number,
                            BulkErrorCode::ChunkProcessingFailed,
                            &err.to_string(),
                        )
                        .await;
                }
            }
        }

        self.tracking
            .complete_chunk(batch_id, event.chunk_index)
            .await;
        Ok(outcome)
    }

    /// Run [`process`](Self::process) under the retry policy.
    ///
    /// Retryable aborts back off and re-run; re-processed records resolve
    /// as duplicates through the processor's idempotence, so counters are
    /// not inflated. Returns the terminal abort when retries are
    /// exhausted or the abort class is not retryable.
    pub async fn process_with_retry(
        &self,
        event: &BulkChunkEvent,
        policy: &RetryPolicy,
    ) -> Result<ChunkOutcome, ChunkError> {
        let mut retries = 0u32;
        loop {
            match self.process(event).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => {
                    if !policy.allows_retry(retries) {
                        return Err(err);
                    }
                    let backoff = policy.backoff_for(retries);
                    retries += 1;
                    warn!(
                        batch_id = %event.batch_id,
                        chunk_index = event.chunk_index,
                        retry = retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err.message,
                        "Chunk aborted, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// Pool of chunk-consuming workers.
pub struct ChunkWorkerPool {
    kafka: KafkaConfig,
    topics: TopicConfig,
    bulk: BulkConfig,
    chunk_processor: Arc<ChunkProcessor>,
    dlt: Arc<DltPublisher>,
}

impl ChunkWorkerPool {
    #[must_use]
    pub fn new(
        kafka: KafkaConfig,
        topics: TopicConfig,
        bulk: BulkConfig,
        processor: Arc<dyn RecordProcessor>,
        tracking: Arc<TrackingStore>,
        dlt: Arc<DltPublisher>,
    ) -> Self {
        Self {
            kafka,
            topics,
            bulk,
            chunk_processor: Arc::new(ChunkProcessor::new(processor, tracking)),
            dlt,
        }
    }

    /// Spawn the configured number of workers.
    ///
    /// Workers run until their task is aborted; partition assignment is
    /// left entirely to the consumer group.
    pub fn spawn(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        (0..self.bulk.concurrency)
            .map(|index| {
                let pool = Arc::clone(&self);
                tokio::spawn(async move {
                    if let Err(e) = pool.run_worker(index).await {
                        error!(worker = index, error = %e, "Chunk worker terminated");
                    }
                })
            })
            .collect()
    }

    async fn run_worker(&self, index: usize) -> Result<(), EventError> {
        let consumer = self.build_consumer(index)?;
        consumer
            .subscribe(&[self.topics.bulk_requests.as_str()])
            .map_err(|e| EventError::ConsumeFailed {
                topic: self.topics.bulk_requests.clone(),
                cause: e.to_string(),
            })?;

        info!(
            worker = index,
            topic = %self.topics.bulk_requests,
            group = %self.topics.consumer_group,
            "Chunk worker started"
        );

        loop {
            match consumer.recv().await {
                Ok(message) => {
                    self.handle_message(&consumer, &message).await;
                }
                Err(e) => {
                    warn!(worker = index, error = %e, "Consumer receive error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    fn build_consumer(&self, index: usize) -> Result<StreamConsumer, EventError> {
        let mut client_config = ClientConfig::new();
        self.kafka.apply(&mut client_config);
        client_config
            .set("group.id", &self.topics.consumer_group)
            .set(
                "client.id",
                format!("{}-worker-{index}", self.kafka.client_id),
            )
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            // Bounds prefetch; backpressure comes from the log, not from
            // in-process queueing.
            .set(
                "queued.min.messages",
                self.bulk.max_poll_records.to_string(),
            );

        client_config
            .create()
            .map_err(|e| EventError::ConnectionFailed {
                broker: self.kafka.bootstrap_servers.clone(),
                cause: e.to_string(),
            })
    }

    async fn handle_message(&self, consumer: &StreamConsumer, message: &BorrowedMessage<'_>) {
        let key = message
            .key()
            .map(String::from_utf8_lossy)
            .unwrap_or_default()
            .into_owned();
        let payload = message.payload().unwrap_or_default();

        let event = match BulkChunkEvent::from_json_bytes(payload) {
            Ok(event) => event,
            Err(e) => {
                // Undecodable payloads can never succeed; dead-letter the
                // raw bytes and move on.
                error!(key = %key, error = %e, "Chunk payload undecodable");
                self.dlt
                    .publish(
                        &key,
                        payload,
                        BulkErrorCode::KafkaDeserializationError,
                        &e.to_string(),
                    )
                    .await;
                self.acknowledge(consumer, message);
                return;
            }
        };

        info!(
            batch_id = %event.batch_id,
            chunk = format!("{}/{}", event.chunk_index + 1, event.total_chunks),
            records = event.records.len(),
            partition = message.partition(),
            offset = message.offset(),
            "Chunk received"
        );

        if let Err(e) = event.validate() {
            // Structurally invalid chunks are acknowledged without
            // processing; there is nothing to retry.
            warn!(batch_id = %event.batch_id, error = %e, "Invalid chunk envelope, acknowledging");
            self.acknowledge(consumer, message);
            return;
        }

        let policy = RetryPolicy::from_config(&self.bulk);
        let started = Instant::now();
        match self
            .chunk_processor
            .process_with_retry(&event, &policy)
            .await
        {
            Ok(outcome) if outcome.cancelled => {
                self.acknowledge(consumer, message);
            }
            Ok(outcome) => {
                info!(
                    batch_id = %event.batch_id,
                    chunk = format!("{}/{}", event.chunk_index + 1, event.total_chunks),
                    succeeded = outcome.succeeded,
                    failed = outcome.failed,
                    skipped = outcome.skipped,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Chunk processed"
                );
                self.acknowledge(consumer, message);
            }
            Err(err) => {
                error!(
                    batch_id = %event.batch_id,
                    chunk_index = event.chunk_index,
                    code = err.code.code(),
                    error = %err.message,
                    "Chunk aborted terminally, dead-lettering"
                );
                self.dlt
                    .publish(&event.chunk_key(), payload, err.code, &err.message)
                    .await;
                self.acknowledge(consumer, message);
            }
        }
    }

    fn acknowledge(&self, consumer: &StreamConsumer, message: &BorrowedMessage<'_>) {
        if let Err(e) = consumer.commit_message(message, CommitMode::Async) {
            warn!(
                partition = message.partition(),
                offset = message.offset(),
                error = %e,
                "Offset commit failed"
            );
        }
    }
}
