//! Error types for the events crate.

use thiserror::Error;
use ticketstream_core::BulkErrorCode;

/// Errors raised by the Kafka layer.
#[derive(Debug, Error)]
pub enum EventError {
    /// Required configuration variable is missing.
    #[error("Configuration missing: {var}")]
    ConfigMissing { var: String },

    /// Configuration value is invalid.
    #[error("Configuration invalid for {var}: {reason}")]
    ConfigInvalid { var: String, reason: String },

    /// Failed to create or connect a Kafka client.
    #[error("Connection to broker {broker} failed: {cause}")]
    ConnectionFailed { broker: String, cause: String },

    /// Failed to publish a chunk to its topic.
    #[error("Failed to publish to topic {topic}: {cause}")]
    PublishFailed { topic: String, cause: String },

    /// Every chunk of a batch failed to publish.
    #[error("All {total_chunks} chunks of batch {batch_id} failed to publish")]
    AllChunksFailed { batch_id: String, total_chunks: u32 },

    /// Failed to serialize a chunk envelope.
    #[error("Failed to serialize chunk {chunk_key}: {cause}")]
    SerializationFailed { chunk_key: String, cause: String },

    /// Failed to deserialize a chunk envelope.
    #[error("Failed to deserialize chunk payload: {cause}")]
    DeserializationFailed { cause: String },

    /// Received envelope is structurally invalid.
    #[error("Invalid chunk envelope: {reason}")]
    InvalidEnvelope { reason: String },

    /// Failed to consume from a topic.
    #[error("Failed to consume from topic {topic}: {cause}")]
    ConsumeFailed { topic: String, cause: String },

    /// Internal Kafka client error.
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
}

impl EventError {
    /// The taxonomy code this error surfaces as.
    #[must_use]
    pub fn error_code(&self) -> BulkErrorCode {
        match self {
            Self::ConfigMissing { .. } | Self::ConfigInvalid { .. } => {
                BulkErrorCode::ConfigurationError
            }
            Self::ConnectionFailed { .. } => BulkErrorCode::KafkaBrokerUnavailable,
            Self::PublishFailed { .. } | Self::AllChunksFailed { .. } | Self::Kafka(_) => {
                BulkErrorCode::KafkaProducerError
            }
            Self::SerializationFailed { .. } => BulkErrorCode::KafkaSerializationError,
            Self::DeserializationFailed { .. } => BulkErrorCode::KafkaDeserializationError,
            Self::InvalidEnvelope { .. } => BulkErrorCode::InvalidRowData,
            Self::ConsumeFailed { .. } => BulkErrorCode::KafkaConsumerError,
        }
    }

    /// Whether the failed operation may be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.error_code().is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            EventError::AllChunksFailed {
                batch_id: "BATCH-1".into(),
                total_chunks: 4
            }
            .error_code(),
            BulkErrorCode::KafkaProducerError
        );
        assert_eq!(
            EventError::DeserializationFailed {
                cause: "bad json".into()
            }
            .error_code(),
            BulkErrorCode::KafkaDeserializationError
        );
    }

    #[test]
    fn test_retryability_follows_taxonomy() {
        assert!(EventError::PublishFailed {
            topic: "t".into(),
            cause: "broker down".into()
        }
        .is_retryable());
        assert!(!EventError::DeserializationFailed {
            cause: "bad json".into()
        }
        .is_retryable());
        assert!(!EventError::ConfigMissing { var: "X".into() }.is_retryable());
    }
}
