//! # ticketstream-events
//!
//! Kafka layer for the bulk ticket pipeline.
//!
//! The producer splits a validated submission into ordered chunks and
//! publishes them with idempotent semantics; the consumer worker pool
//! pulls chunks under a shared consumer group, drives every record
//! through the record processor with per-record failure isolation, and
//! converges outcomes into the tracking store. Chunk-level failures run
//! through an exponential-backoff retry policy and land on the
//! dead-letter topic when retries are exhausted.
//!
//! Delivery contract: at-least-once, ordered within a partition, with
//! explicit per-record acknowledgment (auto-commit disabled).

pub mod config;
pub mod consumer;
pub mod dlt;
pub mod envelope;
pub mod error;
pub mod health;
pub mod producer;
pub mod retry;

pub use config::{KafkaConfig, KafkaConfigBuilder, SaslCredentials, SaslMechanism, SecurityProtocol, TopicConfig};
pub use consumer::{ChunkOutcome, ChunkProcessor, ChunkWorkerPool};
pub use dlt::{DltPublisher, DltReader};
pub use envelope::BulkChunkEvent;
pub use error::EventError;
pub use health::BrokerHealth;
pub use producer::{BatchSubmission, BulkProducer};
pub use retry::RetryPolicy;
