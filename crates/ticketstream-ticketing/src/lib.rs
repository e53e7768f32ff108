//! # ticketstream-ticketing
//!
//! Single-ticket concerns that the bulk pipeline plugs into:
//!
//! - [`RecordProcessor`]: the contract for idempotent ticket creation by
//!   business key, with structured error kinds the consumer classifies.
//! - [`EventBus`]: process-local pub/sub whose events fire only after the
//!   publishing unit of work commits, keeping the read cache consistent
//!   with persisted state.
//! - [`TicketCacheService`]: the Redis-backed single-ticket read cache,
//!   written exclusively by the bus subscriber.

pub mod bus;
pub mod cache;
pub mod processor;

pub use bus::{EventBus, EventSubscriber, TicketEvent, UnitOfWork};
pub use cache::{CacheSubscriber, TicketCacheService};
pub use processor::{InMemoryTicketService, ProcessorError, RecordProcessor};
