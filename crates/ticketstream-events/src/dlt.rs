//! Dead-letter publishing and inspection.
//!
//! Exhausted or non-retryable chunk payloads are published verbatim to
//! the single-partition `<topic>.DLT`, and a [`DltRecord`] is appended to
//! the tracking store's per-topic list so clients can inspect failures
//! without replaying the topic. A separate reader in the `-dlt` consumer
//! group observes arrivals for monitoring; it never reprocesses.

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::{KafkaConfig, TopicConfig};
use crate::envelope::BulkChunkEvent;
use crate::error::EventError;
use ticketstream_core::BulkErrorCode;
use ticketstream_tracking::{DltRecord, TrackingStore};

/// Publishes exhausted payloads to the dead-letter topic and records
/// them in the tracking store.
pub struct DltPublisher {
    producer: FutureProducer,
    topics: TopicConfig,
    tracking: Arc<TrackingStore>,
}

impl DltPublisher {
    pub fn new(
        kafka: &KafkaConfig,
        topics: TopicConfig,
        tracking: Arc<TrackingStore>,
    ) -> Result<Self, EventError> {
        let mut client_config = ClientConfig::new();
        kafka.apply(&mut client_config);
        client_config
            .set("acks", "all")
            .set("message.timeout.ms", "30000");

        let producer: FutureProducer =
            client_config
                .create()
                .map_err(|e| EventError::ConnectionFailed {
                    broker: kafka.bootstrap_servers.clone(),
                    cause: e.to_string(),
                })?;

        Ok(Self {
            producer,
            topics,
            tracking,
        })
    }

    /// Route a failed payload to the dead-letter topic.
    ///
    /// Fire-and-trace: a DLT publish failure is logged, never raised, so
    /// dead-lettering cannot wedge the worker that invoked it.
    pub async fn publish(&self, key: &str, payload: &[u8], code: BulkErrorCode, error_message: &str) {
        let dlt_topic = self.topics.dlt_topic();
        let record = FutureRecord::to(&dlt_topic).key(key).payload(payload);

        match self.producer.send(record, Duration::from_secs(30)).await {
            Ok((partition, offset)) => {
                error!(
                    topic = %dlt_topic,
                    key,
                    partition,
                    offset,
                    code = code.code(),
                    "Message sent to dead-letter topic"
                );
            }
            Err((e, _)) => {
                error!(topic = %dlt_topic, key, error = %e, "Dead-letter publish failed");
            }
        }

        self.tracking
            .append_dlt(
                &dlt_topic,
                DltRecord::new(
                    self.topics.bulk_requests.clone(),
                    key,
                    String::from_utf8_lossy(payload).into_owned(),
                    error_message,
                    code.code(),
                ),
            )
            .await;
    }
}

/// Observes dead-letter arrivals under the `-dlt` consumer group.
///
/// Arrival handling is record-only: the payload is logged with whatever
/// batch context can be decoded, and the message is committed. No
/// automatic reprocessing happens here.
pub struct DltReader {
    consumer: StreamConsumer,
    topics: TopicConfig,
}

impl DltReader {
    pub fn new(kafka: &KafkaConfig, topics: TopicConfig) -> Result<Self, EventError> {
        let mut client_config = ClientConfig::new();
        kafka.apply(&mut client_config);
        client_config
            .set("group.id", topics.dlt_consumer_group())
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest");

        let consumer: StreamConsumer =
            client_config
                .create()
                .map_err(|e| EventError::ConnectionFailed {
                    broker: kafka.bootstrap_servers.clone(),
                    cause: e.to_string(),
                })?;

        Ok(Self { consumer, topics })
    }

    /// Run until the consumer stream errors terminally.
    pub async fn run(self) -> Result<(), EventError> {
        let dlt_topic = self.topics.dlt_topic();
        self.consumer
            .subscribe(&[dlt_topic.as_str()])
            .map_err(|e| EventError::ConsumeFailed {
                topic: dlt_topic.clone(),
                cause: e.to_string(),
            })?;
        info!(topic = %dlt_topic, "Dead-letter reader started");

        loop {
            match self.consumer.recv().await {
                Ok(message) => {
                    let key = message
                        .key()
                        .map(String::from_utf8_lossy)
                        .unwrap_or_default()
                        .into_owned();
                    error!(
                        topic = %message.topic(),
                        partition = message.partition(),
                        offset = message.offset(),
                        key = %key,
                        "Dead-letter message received"
                    );

                    if let Some(payload) = message.payload() {
                        if let Ok(event) = BulkChunkEvent::from_json_bytes(payload) {
                            error!(
                                batch_id = %event.batch_id,
                                chunk = format!("{}/{}", event.chunk_index + 1, event.total_chunks),
                                records = event.records.len(),
                                "Dead-letter chunk details"
                            );
                        }
                    }

                    if let Err(e) = self
                        .consumer
                        .commit_message(&message, rdkafka::consumer::CommitMode::Async)
                    {
                        warn!(error = %e, "Dead-letter offset commit failed");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Dead-letter consumer receive error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}
