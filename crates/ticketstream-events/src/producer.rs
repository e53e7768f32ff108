//! Bulk chunk producer.
//!
//! Splits an accepted record sequence into fixed-size ordered chunks and
//! publishes each as a [`BulkChunkEvent`] keyed by its chunk key. The
//! underlying producer is configured for idempotent publishing
//! (`enable.idempotence`, `acks=all`, bounded in-flight requests) so
//! transport retries cannot duplicate events.

use chrono::Utc;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::{KafkaConfig, TopicConfig};
use crate::envelope::BulkChunkEvent;
use crate::error::EventError;
use crate::health::BrokerHealth;
use ticketstream_core::{BulkConfig, TicketRecord};

/// Result of handing a batch to the durable log.
#[derive(Debug, Clone)]
pub struct BatchSubmission {
    /// Minted batch identifier.
    pub batch_id: String,
    /// Records accepted into the batch.
    pub total_records: usize,
    /// Chunks the batch was split into.
    pub total_chunks: u32,
}

/// Kafka producer for bulk chunk events.
pub struct BulkProducer {
    producer: FutureProducer,
    topics: TopicConfig,
    bulk: BulkConfig,
}

impl BulkProducer {
    /// Create a producer with idempotent-publish settings.
    pub fn new(
        kafka: &KafkaConfig,
        topics: TopicConfig,
        bulk: BulkConfig,
    ) -> Result<Self, EventError> {
        let mut client_config = ClientConfig::new();
        kafka.apply(&mut client_config);
        client_config
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("max.in.flight.requests.per.connection", "5")
            .set("compression.type", "lz4")
            .set(
                "message.timeout.ms",
                (bulk.producer_send_timeout_s * 1000).to_string(),
            );

        let producer: FutureProducer =
            client_config
                .create()
                .map_err(|e| EventError::ConnectionFailed {
                    broker: kafka.bootstrap_servers.clone(),
                    cause: e.to_string(),
                })?;

        info!(
            bootstrap_servers = %kafka.bootstrap_servers,
            topic = %topics.bulk_requests,
            "Bulk producer created"
        );

        Ok(Self {
            producer,
            topics,
            bulk,
        })
    }

    /// Publish a validated record sequence as a new batch.
    ///
    /// Returns as soon as every chunk publish has been resolved. A batch
    /// where every chunk failed raises a retryable producer error; a
    /// partial failure is logged and the batch id still returns, because
    /// the tracking store will reflect the surviving chunks.
    #[instrument(skip(self, records), fields(records = records.len(), submitted_by = %submitted_by))]
    pub async fn publish_batch(
        &self,
        records: Vec<TicketRecord>,
        submitted_by: &str,
        source_filename: &str,
    ) -> Result<BatchSubmission, EventError> {
        let batch_id = mint_batch_id();
        let total_records = records.len();
        let chunks = chunk_records(records, self.bulk.chunk_size);
        let total_chunks = chunks.len() as u32;

        info!(
            batch_id = %batch_id,
            total_records,
            total_chunks,
            "Bulk upload initiated"
        );

        let mut failed_chunks = 0u32;
        for (index, chunk) in chunks.into_iter().enumerate() {
            let event = BulkChunkEvent::new(
                batch_id.clone(),
                index as u32,
                total_chunks,
                total_records as u64,
                chunk,
                submitted_by,
                source_filename,
            );
            if let Err(e) = self.send_chunk(&event).await {
                failed_chunks += 1;
                error!(
                    batch_id = %batch_id,
                    chunk_index = index,
                    error = %e,
                    "Chunk publish failed"
                );
            }
        }

        if total_chunks > 0 && failed_chunks == total_chunks {
            return Err(EventError::AllChunksFailed {
                batch_id,
                total_chunks,
            });
        }
        if failed_chunks > 0 {
            warn!(
                batch_id = %batch_id,
                failed_chunks,
                total_chunks,
                "Partial publish; surviving chunks will be tracked"
            );
        }

        info!(batch_id = %batch_id, sent = total_chunks - failed_chunks, total_chunks, "Bulk upload queued");
        Ok(BatchSubmission {
            batch_id,
            total_records,
            total_chunks,
        })
    }

    async fn send_chunk(&self, event: &BulkChunkEvent) -> Result<(), EventError> {
        let key = event.partition_key(self.bulk.partition_key_mode);
        let payload = event.to_json_bytes()?;

        debug!(
            chunk_key = %event.chunk_key(),
            payload_size = payload.len(),
            records = event.records.len(),
            "Publishing chunk"
        );

        let record = FutureRecord::to(&self.topics.bulk_requests)
            .key(&key)
            .payload(&payload);

        let (partition, offset) = self
            .producer
            .send(record, self.bulk.producer_send_timeout())
            .await
            .map_err(|(err, _)| EventError::PublishFailed {
                topic: self.topics.bulk_requests.clone(),
                cause: err.to_string(),
            })?;

        debug!(
            chunk_key = %event.chunk_key(),
            partition,
            offset,
            "Chunk published"
        );
        Ok(())
    }

    /// Probe broker connectivity and the bulk topic topology.
    pub async fn health_check(&self) -> Result<BrokerHealth, EventError> {
        let metadata = self
            .producer
            .client()
            .fetch_metadata(None, Duration::from_secs(5))
            .map_err(|e| EventError::ConnectionFailed {
                broker: "unknown".to_string(),
                cause: e.to_string(),
            })?;

        let dlt_topic = self.topics.dlt_topic();
        let mut bulk_topic_found = false;
        let mut dlt_topic_found = false;
        for topic in metadata.topics() {
            if topic.name() == self.topics.bulk_requests {
                bulk_topic_found = true;
            } else if topic.name() == dlt_topic {
                dlt_topic_found = true;
            }
        }

        Ok(BrokerHealth {
            connected: true,
            brokers: metadata.brokers().len(),
            bulk_topic_found,
            dlt_topic_found,
        })
    }
}

/// Mint a batch identifier: `BATCH-{millis}-{8 uppercase hex}`.
fn mint_batch_id() -> String {
    let suffix: String = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("BATCH-{}-{}", Utc::now().timestamp_millis(), suffix)
}

/// Split records into chunks of at most `chunk_size`, preserving order.
fn chunk_records(records: Vec<TicketRecord>, chunk_size: usize) -> Vec<Vec<TicketRecord>> {
    if records.is_empty() {
        return Vec::new();
    }
    let mut chunks = Vec::with_capacity(records.len().div_ceil(chunk_size.max(1)));
    let mut current = Vec::with_capacity(chunk_size);
    for record in records {
        current.push(record);
        if current.len() == chunk_size {
            chunks.push(std::mem::replace(&mut current, Vec::with_capacity(chunk_size)));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(n: usize) -> Vec<TicketRecord> {
        (0..n)
            .map(|i| TicketRecord::new(format!("TKT-{i:03}"), "Title", 1000 + i as i64))
            .collect()
    }

    #[test]
    fn test_chunking_exact_and_remainder() {
        let chunks = chunk_records(records(350), 100);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[1].len(), 100);
        assert_eq!(chunks[2].len(), 100);
        assert_eq!(chunks[3].len(), 50);
    }

    #[test]
    fn test_chunking_preserves_order() {
        let chunks = chunk_records(records(250), 100);
        assert_eq!(chunks[0][0].ticket_number, "TKT-000");
        assert_eq!(chunks[0][99].ticket_number, "TKT-099");
        assert_eq!(chunks[1][0].ticket_number, "TKT-100");
        assert_eq!(chunks[2][49].ticket_number, "TKT-249");
    }

    #[test]
    fn test_chunking_boundaries() {
        assert!(chunk_records(vec![], 100).is_empty());
        assert_eq!(chunk_records(records(1), 100).len(), 1);
        assert_eq!(chunk_records(records(100), 100).len(), 1);
        assert_eq!(chunk_records(records(101), 100).len(), 2);
    }

    #[test]
    fn test_mint_batch_id_shape() {
        let id = mint_batch_id();
        assert!(id.starts_with("BATCH-"));
        let parts: Vec<&str> = id.splitn(3, '-').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 8);
        assert_eq!(parts[2], parts[2].to_uppercase());
    }

    #[test]
    fn test_producer_creation_is_lazy() {
        let kafka = KafkaConfig::builder()
            .bootstrap_servers("localhost:9092")
            .client_id("test")
            .build()
            .unwrap();
        // Creation succeeds without a reachable broker; connection is lazy.
        let producer = BulkProducer::new(&kafka, TopicConfig::default(), BulkConfig::default());
        assert!(producer.is_ok());
    }
}
