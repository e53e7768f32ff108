//! Single-ticket read cache.
//!
//! Cache-aside over Redis with keys `ticket:id:{id}` and
//! `ticket:number:{ticket_number}`, both holding the JSON snapshot with a
//! 30-minute default TTL. The cache is written only by the post-commit
//! event subscriber, so it can never hold a ticket whose transaction
//! rolled back. Every cache failure is logged and swallowed.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::bus::{EventSubscriber, TicketEvent};
use ticketstream_core::TicketSnapshot;

fn id_key(id: i64) -> String {
    format!("ticket:id:{id}")
}

fn number_key(ticket_number: &str) -> String {
    format!("ticket:number:{ticket_number}")
}

/// Redis-backed ticket cache. Constructed without a connection it is a
/// no-op: reads miss and writes are discarded.
pub struct TicketCacheService {
    conn: Option<MultiplexedConnection>,
    ttl_secs: u64,
}

impl TicketCacheService {
    /// Connect to Redis with the given entry TTL.
    pub async fn connect(redis_url: &str, ttl_secs: u64) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            conn: Some(conn),
            ttl_secs,
        })
    }

    /// No-op cache for when Redis is unavailable.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            conn: None,
            ttl_secs: 0,
        }
    }

    /// Look up a ticket by id.
    pub async fn get_by_id(&self, id: i64) -> Option<TicketSnapshot> {
        self.get(&id_key(id)).await
    }

    /// Look up a ticket by business key.
    pub async fn get_by_number(&self, ticket_number: &str) -> Option<TicketSnapshot> {
        self.get(&number_key(ticket_number)).await
    }

    async fn get(&self, key: &str) -> Option<TicketSnapshot> {
        let conn = self.conn.as_ref()?;
        let mut conn = conn.clone();
        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(snapshot) => {
                    debug!(key, "Cache hit");
                    Some(snapshot)
                }
                Err(e) => {
                    warn!(key, error = %e, "Discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "Cache read failed");
                None
            }
        }
    }

    /// Store a ticket under both its id and business-key entries.
    pub async fn cache_ticket(&self, snapshot: &TicketSnapshot) {
        let Some(conn) = &self.conn else { return };
        let mut conn = conn.clone();
        let json = match serde_json::to_string(snapshot) {
            Ok(json) => json,
            Err(e) => {
                warn!(id = snapshot.id, error = %e, "Cache serialize failed");
                return;
            }
        };
        let mut pipe = redis::pipe();
        pipe.set_ex(id_key(snapshot.id), &json, self.ttl_secs)
            .ignore()
            .set_ex(number_key(&snapshot.ticket_number), &json, self.ttl_secs)
            .ignore();
        let written: Result<(), redis::RedisError> = pipe.query_async(&mut conn).await;
        if let Err(e) = written {
            warn!(id = snapshot.id, error = %e, "Cache write failed");
        } else {
            debug!(
                id = snapshot.id,
                ticket_number = %snapshot.ticket_number,
                "Ticket cached"
            );
        }
    }

    /// Drop both entries for a ticket.
    pub async fn evict_ticket(&self, id: i64, ticket_number: &str) {
        let Some(conn) = &self.conn else { return };
        let mut conn = conn.clone();
        let keys = [id_key(id), number_key(ticket_number)];
        if let Err(e) = conn.del::<_, ()>(&keys).await {
            warn!(id, error = %e, "Cache evict failed");
        }
    }
}

/// Bus subscriber that keeps the ticket cache coherent.
///
/// Hydrates on create/update/read-miss events, evicts on delete, and does
/// nothing on rollback markers. Never raises: the cache service already
/// swallows its errors.
pub struct CacheSubscriber {
    cache: Arc<TicketCacheService>,
}

impl CacheSubscriber {
    #[must_use]
    pub fn new(cache: Arc<TicketCacheService>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl EventSubscriber for CacheSubscriber {
    async fn on_event(&self, event: &TicketEvent) {
        match event {
            TicketEvent::Created { snapshot, .. }
            | TicketEvent::Updated { snapshot, .. }
            | TicketEvent::CacheHydrate { snapshot, .. } => {
                self.cache.cache_ticket(snapshot).await;
            }
            TicketEvent::Deleted { id, ticket_number } => {
                self.cache.evict_ticket(*id, ticket_number).await;
            }
            TicketEvent::RolledBack { reason } => {
                debug!(reason = %reason, "No cache action for rolled-back unit");
            }
        }
    }
}
