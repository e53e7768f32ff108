//! Record processor contract.
//!
//! The consumer drives every record of a chunk through a
//! [`RecordProcessor`]. Creation is idempotent by business key: the
//! processor reports an existing ticket as [`ProcessorError::Duplicate`],
//! which the pipeline counts as skipped rather than failed. Error kinds
//! form a closed set so the consumer's classification table stays total.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::bus::{EventBus, TicketEvent};
use ticketstream_core::{BulkErrorCode, TicketRecord, TicketSnapshot};

/// Failure kinds a record processor can report.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProcessorError {
    /// A ticket with this business key already exists.
    #[error("Duplicate ticket number: {ticket_number}")]
    Duplicate { ticket_number: String },

    /// The request was structurally absent.
    #[error("Ticket request is null")]
    NullRequest,

    /// The request failed semantic validation.
    #[error("Invalid ticket data: {message}")]
    InvalidRow { message: String },

    /// The requested status change is not allowed.
    #[error("Invalid status transition: {message}")]
    InvalidStatusTransition { message: String },

    /// A storage constraint rejected the write.
    #[error("Data integrity violation: {message}")]
    DataIntegrity { message: String },

    /// Transient data-access failure; the write may be retried.
    #[error("Database error: {message}")]
    Database { message: String },

    /// The call exceeded its time budget.
    #[error("Operation timed out")]
    Timeout,

    /// Unclassified internal failure.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ProcessorError {
    /// The taxonomy code this failure records under.
    #[must_use]
    pub fn error_code(&self) -> BulkErrorCode {
        match self {
            Self::Duplicate { .. } => BulkErrorCode::DuplicateTicket,
            Self::NullRequest => BulkErrorCode::NullRequest,
            Self::InvalidRow { .. } => BulkErrorCode::InvalidRowData,
            Self::InvalidStatusTransition { .. } => BulkErrorCode::InvalidStatusTransition,
            Self::DataIntegrity { .. } => BulkErrorCode::DuplicateTicket,
            Self::Database { .. } => BulkErrorCode::DatabaseError,
            Self::Timeout => BulkErrorCode::TimeoutError,
            Self::Internal { message } => BulkErrorCode::classify_message(message),
        }
    }
}

/// Idempotent single-ticket creation by business key.
#[async_trait]
pub trait RecordProcessor: Send + Sync {
    /// Create one ticket. Must be idempotent on `ticket_number`: a repeat
    /// delivery of an already-created ticket reports
    /// [`ProcessorError::Duplicate`].
    async fn create_ticket(&self, record: &TicketRecord)
        -> Result<TicketSnapshot, ProcessorError>;
}

/// In-process reference implementation of the record processor.
///
/// Enforces business-key uniqueness, assigns sequential ids, and
/// publishes a post-commit [`TicketEvent::Created`] through the bus so
/// the read cache stays coherent. Used by the self-contained server mode
/// and the pipeline tests.
pub struct InMemoryTicketService {
    bus: Arc<EventBus>,
    tickets: RwLock<HashMap<String, TicketSnapshot>>,
    next_id: AtomicI64,
}

impl InMemoryTicketService {
    #[must_use]
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            tickets: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Pre-seed an existing ticket (test and replay scenarios).
    pub async fn seed(&self, record: &TicketRecord) {
        let snapshot = self.snapshot_from(record);
        self.tickets
            .write()
            .await
            .insert(record.ticket_number.clone(), snapshot);
    }

    /// Fetch a created ticket by business key.
    pub async fn get_by_number(&self, ticket_number: &str) -> Option<TicketSnapshot> {
        self.tickets.read().await.get(ticket_number).cloned()
    }

    /// Number of tickets created so far.
    pub async fn len(&self) -> usize {
        self.tickets.read().await.len()
    }

    /// Whether no tickets have been created.
    pub async fn is_empty(&self) -> bool {
        self.tickets.read().await.is_empty()
    }

    fn snapshot_from(&self, record: &TicketRecord) -> TicketSnapshot {
        let now = Utc::now();
        TicketSnapshot {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            ticket_number: record.ticket_number.clone(),
            title: record.title.clone(),
            description: record.description.clone(),
            status: record.status,
            priority: record.priority,
            customer_id: record.customer_id,
            assignee_id: record.assignee_id,
            created_at: now,
            updated_at: now,
        }
    }

    fn validate(record: &TicketRecord) -> Result<(), ProcessorError> {
        if record.ticket_number.trim().is_empty() {
            return Err(ProcessorError::InvalidRow {
                message: "ticket number is empty".to_string(),
            });
        }
        if record.title.trim().is_empty() {
            return Err(ProcessorError::InvalidRow {
                message: "title is empty".to_string(),
            });
        }
        if record.customer_id <= 0 {
            return Err(ProcessorError::InvalidRow {
                message: format!("customer id must be positive, got {}", record.customer_id),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RecordProcessor for InMemoryTicketService {
    async fn create_ticket(
        &self,
        record: &TicketRecord,
    ) -> Result<TicketSnapshot, ProcessorError> {
        Self::validate(record)?;

        let snapshot = {
            let mut tickets = self.tickets.write().await;
            if tickets.contains_key(&record.ticket_number) {
                return Err(ProcessorError::Duplicate {
                    ticket_number: record.ticket_number.clone(),
                });
            }
            let snapshot = self.snapshot_from(record);
            tickets.insert(record.ticket_number.clone(), snapshot.clone());
            snapshot
        };

        // The write above is this service's "transaction"; the cache
        // event fires only after it is in place.
        let mut uow = self.bus.begin();
        uow.publish(TicketEvent::Created {
            id: snapshot.id,
            snapshot: snapshot.clone(),
        });
        uow.commit().await;

        debug!(
            ticket_number = %snapshot.ticket_number,
            id = snapshot.id,
            "Ticket created"
        );
        Ok(snapshot)
    }
}
