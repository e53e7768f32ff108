//! # ticketstream-core
//!
//! Shared building blocks for the bulk ticket processing pipeline:
//!
//! - **Error taxonomy**: the closed [`BulkErrorCode`] set used by the
//!   producer, consumer, and API surfaces to classify failures and drive
//!   retry decisions.
//! - **Domain model**: validated ticket records, status/priority enums,
//!   and created-ticket snapshots.
//! - **Configuration**: the [`BulkConfig`] knob set shared by every
//!   pipeline component.

pub mod config;
pub mod error;
pub mod model;

pub use config::{BulkConfig, BulkConfigBuilder, PartitionKeyMode};
pub use error::{BulkErrorCode, ErrorClass};
pub use model::{TicketPriority, TicketRecord, TicketSnapshot, TicketStatus};
