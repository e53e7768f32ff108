//! # ticketstream-api
//!
//! Submission and query surface of the bulk pipeline:
//!
//! - **Parser**: decodes a tabular upload into validated
//!   [`TicketRecord`](ticketstream_core::TicketRecord)s with per-row
//!   error reporting and a bulk-reject threshold.
//! - **Orchestrator**: composes parser and producer, returning the
//!   minted batch id promptly; processing is asynchronous by contract.
//! - **Query facade**: read-only shaping of tracking-store snapshots
//!   into response DTOs, plus advisory cancellation.

pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod validation;

pub use error::ApiError;
pub use router::{bulk_router, ApiState};
pub use services::bulk_service::{BulkUploadService, ChunkPublisher};
pub use services::csv_parser::{CsvParseOutcome, ParseError, RowError};
