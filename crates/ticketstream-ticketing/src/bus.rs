//! Post-commit event bus.
//!
//! Process-local pub/sub keeping the ticket read cache coherent with the
//! database. Events are staged on a [`UnitOfWork`] and delivered to
//! subscribers only after the unit commits; a rollback delivers a single
//! [`TicketEvent::RolledBack`] marker instead. Events from one unit are
//! delivered in publish order; concurrent commits may interleave.
//!
//! Subscribers must not raise: cache failures are non-fatal by contract,
//! so every subscriber guards its own errors.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use ticketstream_core::TicketSnapshot;

/// Events describing committed ticket state changes.
#[derive(Debug, Clone)]
pub enum TicketEvent {
    /// A ticket was created and committed.
    Created { id: i64, snapshot: TicketSnapshot },
    /// A ticket was updated and committed.
    Updated { id: i64, snapshot: TicketSnapshot },
    /// A ticket was deleted and committed.
    Deleted { id: i64, ticket_number: String },
    /// A ticket was read from the database on a cache miss; hydrate the
    /// cache once the reading transaction completes.
    CacheHydrate { id: i64, snapshot: TicketSnapshot },
    /// The publishing unit of work rolled back; no state was persisted.
    RolledBack { reason: String },
}

impl TicketEvent {
    /// Short tag for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Updated { .. } => "updated",
            Self::Deleted { .. } => "deleted",
            Self::CacheHydrate { .. } => "cache_hydrate",
            Self::RolledBack { .. } => "rolled_back",
        }
    }
}

/// A subscriber to post-commit ticket events.
///
/// Implementations must swallow their own failures; the dispatcher
/// assumes `on_event` cannot fail.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    async fn on_event(&self, event: &TicketEvent);
}

/// Process-local post-commit event bus.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<Arc<dyn EventSubscriber>>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. Subscribers are invoked in registration
    /// order for every delivered event.
    pub async fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers.write().await.push(subscriber);
    }

    /// Open a unit of work that stages events until commit.
    #[must_use]
    pub fn begin(self: &Arc<Self>) -> UnitOfWork {
        UnitOfWork {
            bus: Arc::clone(self),
            staged: Vec::new(),
        }
    }

    async fn dispatch(&self, events: &[TicketEvent]) {
        let subscribers = self.subscribers.read().await;
        for event in events {
            debug!(kind = event.kind(), "Dispatching post-commit event");
            for subscriber in subscribers.iter() {
                subscriber.on_event(event).await;
            }
        }
    }
}

/// Staged events for one business transaction.
///
/// Nothing reaches subscribers until [`commit`](Self::commit); dropping
/// the unit discards its staged events.
pub struct UnitOfWork {
    bus: Arc<EventBus>,
    staged: Vec<TicketEvent>,
}

impl UnitOfWork {
    /// Stage an event for delivery after commit.
    pub fn publish(&mut self, event: TicketEvent) {
        self.staged.push(event);
    }

    /// Commit: deliver staged events to subscribers in publish order.
    pub async fn commit(self) {
        self.bus.dispatch(&self.staged).await;
    }

    /// Roll back: staged events are discarded and subscribers see a
    /// single rollback marker for monitoring.
    pub async fn rollback(self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(reason = %reason, discarded = self.staged.len(), "Unit of work rolled back");
        self.bus
            .dispatch(&[TicketEvent::RolledBack { reason }])
            .await;
    }
}
