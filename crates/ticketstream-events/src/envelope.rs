//! Chunk envelope published to the durable log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EventError;
use ticketstream_core::{PartitionKeyMode, TicketRecord};

/// One chunk of a bulk submission, as carried on the wire.
///
/// Chunks are immutable: the producer builds them once and ownership
/// transfers to the log. `records` preserves submission order within the
/// chunk; ordering across chunks is not guaranteed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkChunkEvent {
    /// Globally unique event instance id.
    pub event_id: Uuid,
    /// Batch this chunk belongs to.
    pub batch_id: String,
    /// 0-based chunk position within the batch.
    pub chunk_index: u32,
    /// Total chunks in the batch.
    pub total_chunks: u32,
    /// Total records in the batch (all chunks), for tracking
    /// initialization by whichever chunk arrives first.
    pub total_records: u64,
    /// Validated records in this chunk, in submission order.
    pub records: Vec<TicketRecord>,
    /// Who initiated the upload.
    pub submitted_by: String,
    /// Original uploaded filename.
    pub source_filename: String,
    /// When the chunk was produced.
    pub timestamp: DateTime<Utc>,
}

impl BulkChunkEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        batch_id: impl Into<String>,
        chunk_index: u32,
        total_chunks: u32,
        total_records: u64,
        records: Vec<TicketRecord>,
        submitted_by: impl Into<String>,
        source_filename: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            batch_id: batch_id.into(),
            chunk_index,
            total_chunks,
            total_records,
            records,
            submitted_by: submitted_by.into(),
            source_filename: source_filename.into(),
            timestamp: Utc::now(),
        }
    }

    /// Stable message key for this chunk.
    #[must_use]
    pub fn chunk_key(&self) -> String {
        format!("{}-CHUNK-{}", self.batch_id, self.chunk_index)
    }

    /// Partition key under the configured keying mode.
    #[must_use]
    pub fn partition_key(&self, mode: PartitionKeyMode) -> String {
        match mode {
            PartitionKeyMode::ChunkKey => self.chunk_key(),
            PartitionKeyMode::CustomerId => self
                .records
                .first()
                .map_or_else(|| self.chunk_key(), |r| r.customer_id.to_string()),
        }
    }

    /// Serialize the envelope to JSON bytes.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, EventError> {
        serde_json::to_vec(self).map_err(|e| EventError::SerializationFailed {
            chunk_key: self.chunk_key(),
            cause: e.to_string(),
        })
    }

    /// Deserialize an envelope from JSON bytes.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, EventError> {
        serde_json::from_slice(bytes).map_err(|e| EventError::DeserializationFailed {
            cause: e.to_string(),
        })
    }

    /// Structural validation applied on delivery, before any processing.
    ///
    /// The records list may be empty (the chunk still completes), but the
    /// batch id must be present and the chunk position must be coherent.
    pub fn validate(&self) -> Result<(), EventError> {
        if self.batch_id.trim().is_empty() {
            return Err(EventError::InvalidEnvelope {
                reason: "batch_id is empty".to_string(),
            });
        }
        if self.total_chunks == 0 {
            return Err(EventError::InvalidEnvelope {
                reason: "total_chunks is zero".to_string(),
            });
        }
        if self.chunk_index >= self.total_chunks {
            return Err(EventError::InvalidEnvelope {
                reason: format!(
                    "chunk_index {} out of range for {} chunks",
                    self.chunk_index, self.total_chunks
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> BulkChunkEvent {
        BulkChunkEvent::new(
            "BATCH-1700000000000-DEADBEEF",
            2,
            4,
            350,
            vec![TicketRecord::new("TKT-201", "Dash", 1003)],
            "system",
            "tickets.csv",
        )
    }

    #[test]
    fn test_chunk_key() {
        assert_eq!(
            event().chunk_key(),
            "BATCH-1700000000000-DEADBEEF-CHUNK-2"
        );
    }

    #[test]
    fn test_partition_key_modes() {
        let e = event();
        assert_eq!(e.partition_key(PartitionKeyMode::ChunkKey), e.chunk_key());
        assert_eq!(e.partition_key(PartitionKeyMode::CustomerId), "1003");

        let empty = BulkChunkEvent::new("B", 0, 1, 0, vec![], "system", "f.csv");
        // Empty chunks fall back to the chunk key.
        assert_eq!(
            empty.partition_key(PartitionKeyMode::CustomerId),
            empty.chunk_key()
        );
    }

    #[test]
    fn test_json_round_trip() {
        let e = event();
        let bytes = e.to_json_bytes().unwrap();
        let back = BulkChunkEvent::from_json_bytes(&bytes).unwrap();
        assert_eq!(back.event_id, e.event_id);
        assert_eq!(back.batch_id, e.batch_id);
        assert_eq!(back.chunk_index, 2);
        assert_eq!(back.total_records, 350);
        assert_eq!(back.records.len(), 1);
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(BulkChunkEvent::from_json_bytes(b"not json").is_err());
    }

    #[test]
    fn test_validate() {
        assert!(event().validate().is_ok());

        let mut bad = event();
        bad.batch_id = "  ".to_string();
        assert!(bad.validate().is_err());

        let mut bad = event();
        bad.chunk_index = 4;
        assert!(bad.validate().is_err());

        let mut empty_records = event();
        empty_records.records.clear();
        assert!(empty_records.validate().is_ok());
    }
}
