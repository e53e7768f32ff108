//! Error code taxonomy for bulk processing.
//!
//! Every failure the pipeline can record is drawn from this closed set.
//! Codes are grouped by class prefix: `V1xxx` validation, `P2xxx`
//! processing, `I3xxx` infrastructure, `K4xxx` transport, `E9xxx` general.
//! Each code carries its wire string, a human description, and whether the
//! operation that produced it may be retried.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Broad class of an error code, derived from its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Input validation failures (V1xxx). Never retryable.
    Validation,
    /// Record/chunk/batch processing failures (P2xxx).
    Processing,
    /// Infrastructure failures: database, cache, I/O (I3xxx).
    Infrastructure,
    /// Message transport failures (K4xxx).
    Transport,
    /// General/unclassified failures (E9xxx).
    General,
}

/// Closed error code set for bulk ticket processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BulkErrorCode {
    // Validation (V1xxx)
    EmptyFile,
    InvalidFileFormat,
    MissingRequiredColumns,
    InvalidRowData,
    MissingTicketNumber,
    InvalidCustomerId,
    MissingTitle,
    NullRequest,
    BatchSizeExceeded,

    // Processing (P2xxx)
    DuplicateTicket,
    TicketCreationFailed,
    ChunkProcessingFailed,
    BatchProcessingFailed,
    RecordProcessingFailed,
    InvalidStatusTransition,
    InvalidPriority,

    // Infrastructure (I3xxx)
    DatabaseError,
    RedisError,
    IoError,
    TimeoutError,
    MemoryError,

    // Transport (K4xxx)
    KafkaProducerError,
    KafkaConsumerError,
    KafkaSerializationError,
    KafkaDeserializationError,
    KafkaBrokerUnavailable,
    KafkaTopicNotFound,
    SentToDlt,
    KafkaCommitFailed,

    // General (E9xxx)
    UnknownError,
    InternalError,
    ConfigurationError,
}

impl BulkErrorCode {
    /// Wire-format code string, stable across releases.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyFile => "V1001",
            Self::InvalidFileFormat => "V1002",
            Self::MissingRequiredColumns => "V1003",
            Self::InvalidRowData => "V1004",
            Self::MissingTicketNumber => "V1005",
            Self::InvalidCustomerId => "V1006",
            Self::MissingTitle => "V1007",
            Self::NullRequest => "V1008",
            Self::BatchSizeExceeded => "V1009",
            Self::DuplicateTicket => "P2001",
            Self::TicketCreationFailed => "P2002",
            Self::ChunkProcessingFailed => "P2003",
            Self::BatchProcessingFailed => "P2004",
            Self::RecordProcessingFailed => "P2005",
            Self::InvalidStatusTransition => "P2006",
            Self::InvalidPriority => "P2007",
            Self::DatabaseError => "I3001",
            Self::RedisError => "I3002",
            Self::IoError => "I3003",
            Self::TimeoutError => "I3004",
            Self::MemoryError => "I3005",
            Self::KafkaProducerError => "K4001",
            Self::KafkaConsumerError => "K4002",
            Self::KafkaSerializationError => "K4003",
            Self::KafkaDeserializationError => "K4004",
            Self::KafkaBrokerUnavailable => "K4005",
            Self::KafkaTopicNotFound => "K4006",
            Self::SentToDlt => "K4007",
            Self::KafkaCommitFailed => "K4008",
            Self::UnknownError => "E9001",
            Self::InternalError => "E9002",
            Self::ConfigurationError => "E9003",
        }
    }

    /// Human-readable default description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::EmptyFile => "File is empty or contains no data",
            Self::InvalidFileFormat => "Invalid file format",
            Self::MissingRequiredColumns => "Missing required columns in CSV",
            Self::InvalidRowData => "Invalid row data",
            Self::MissingTicketNumber => "Ticket number is required",
            Self::InvalidCustomerId => "Invalid customer ID",
            Self::MissingTitle => "Title is required",
            Self::NullRequest => "Request payload is null",
            Self::BatchSizeExceeded => "Batch size exceeds maximum limit",
            Self::DuplicateTicket => "Duplicate ticket number",
            Self::TicketCreationFailed => "Failed to create ticket",
            Self::ChunkProcessingFailed => "Failed to process chunk",
            Self::BatchProcessingFailed => "Failed to process batch",
            Self::RecordProcessingFailed => "Failed to process record",
            Self::InvalidStatusTransition => "Invalid status transition",
            Self::InvalidPriority => "Invalid priority value",
            Self::DatabaseError => "Database error",
            Self::RedisError => "Redis cache error",
            Self::IoError => "I/O error",
            Self::TimeoutError => "Operation timeout",
            Self::MemoryError => "Out of memory",
            Self::KafkaProducerError => "Kafka producer error",
            Self::KafkaConsumerError => "Kafka consumer error",
            Self::KafkaSerializationError => "Kafka serialization error",
            Self::KafkaDeserializationError => "Kafka deserialization error",
            Self::KafkaBrokerUnavailable => "Kafka broker unavailable",
            Self::KafkaTopicNotFound => "Kafka topic not found",
            Self::SentToDlt => "Message sent to Dead Letter Topic",
            Self::KafkaCommitFailed => "Failed to commit offset",
            Self::UnknownError => "Unknown error occurred",
            Self::InternalError => "Internal system error",
            Self::ConfigurationError => "Configuration error",
        }
    }

    /// Whether the operation that produced this code may be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TicketCreationFailed
                | Self::ChunkProcessingFailed
                | Self::BatchProcessingFailed
                | Self::RecordProcessingFailed
                | Self::DatabaseError
                | Self::RedisError
                | Self::IoError
                | Self::TimeoutError
                | Self::KafkaProducerError
                | Self::KafkaConsumerError
                | Self::KafkaBrokerUnavailable
                | Self::KafkaCommitFailed
                | Self::UnknownError
                | Self::InternalError
        )
    }

    /// Class of this code, derived from its prefix.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self.code().as_bytes()[0] {
            b'V' => ErrorClass::Validation,
            b'P' => ErrorClass::Processing,
            b'I' => ErrorClass::Infrastructure,
            b'K' => ErrorClass::Transport,
            _ => ErrorClass::General,
        }
    }

    /// HTTP status for surfacing this code on the submission path.
    ///
    /// Validation maps to 400 (except oversized uploads at 413), transport
    /// to 503, infrastructure to 503 when retryable and 500 otherwise, and
    /// duplicates to 409.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self.class() {
            ErrorClass::Validation => 400,
            ErrorClass::Transport => 503,
            ErrorClass::Infrastructure => {
                if self.is_retryable() {
                    503
                } else {
                    500
                }
            }
            ErrorClass::Processing => {
                if *self == Self::DuplicateTicket {
                    409
                } else {
                    500
                }
            }
            ErrorClass::General => 500,
        }
    }

    /// Classify an opaque error message into a code using substring hints.
    ///
    /// Used by both the producer and consumer paths when an error escapes
    /// the typed handlers. Falls back to `UnknownError`.
    #[must_use]
    pub fn classify_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("duplicate") {
            Self::DuplicateTicket
        } else if lower.contains("validation") {
            Self::InvalidRowData
        } else if lower.contains("timeout") || lower.contains("timed out") {
            Self::TimeoutError
        } else if lower.contains("redis") {
            Self::RedisError
        } else if lower.contains("kafka") || lower.contains("broker") {
            Self::KafkaBrokerUnavailable
        } else {
            Self::UnknownError
        }
    }
}

impl fmt::Display for BulkErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.description())
    }
}

impl FromStr for BulkErrorCode {
    type Err = UnknownErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const ALL: &[BulkErrorCode] = &[
            BulkErrorCode::EmptyFile,
            BulkErrorCode::InvalidFileFormat,
            BulkErrorCode::MissingRequiredColumns,
            BulkErrorCode::InvalidRowData,
            BulkErrorCode::MissingTicketNumber,
            BulkErrorCode::InvalidCustomerId,
            BulkErrorCode::MissingTitle,
            BulkErrorCode::NullRequest,
            BulkErrorCode::BatchSizeExceeded,
            BulkErrorCode::DuplicateTicket,
            BulkErrorCode::TicketCreationFailed,
            BulkErrorCode::ChunkProcessingFailed,
            BulkErrorCode::BatchProcessingFailed,
            BulkErrorCode::RecordProcessingFailed,
            BulkErrorCode::InvalidStatusTransition,
            BulkErrorCode::InvalidPriority,
            BulkErrorCode::DatabaseError,
            BulkErrorCode::RedisError,
            BulkErrorCode::IoError,
            BulkErrorCode::TimeoutError,
            BulkErrorCode::MemoryError,
            BulkErrorCode::KafkaProducerError,
            BulkErrorCode::KafkaConsumerError,
            BulkErrorCode::KafkaSerializationError,
            BulkErrorCode::KafkaDeserializationError,
            BulkErrorCode::KafkaBrokerUnavailable,
            BulkErrorCode::KafkaTopicNotFound,
            BulkErrorCode::SentToDlt,
            BulkErrorCode::KafkaCommitFailed,
            BulkErrorCode::UnknownError,
            BulkErrorCode::InternalError,
            BulkErrorCode::ConfigurationError,
        ];
        ALL.iter()
            .find(|c| c.code() == s)
            .copied()
            .ok_or_else(|| UnknownErrorCode(s.to_string()))
    }
}

/// A code string that does not belong to the taxonomy.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Unknown bulk error code: {0}")]
pub struct UnknownErrorCode(pub String);
