//! Redis-backed tracking store.
//!
//! All counter updates are single Redis commands (HINCRBY) and the
//! chunk-completion transition runs as one Lua script, so concurrent
//! workers across partitions and processes can never observe a torn
//! update or both conclude "last chunk".
//!
//! Every mutating operation degrades to the process-local
//! [`InMemoryTracker`] when Redis is unreachable; the error is logged and
//! swallowed so tracking outages cannot block ticket creation.

use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

use crate::keys;
use crate::memory::InMemoryTracker;
use crate::types::{BatchState, BatchStatus, DltRecord, FailureRecord};
use ticketstream_core::BulkErrorCode;

/// Errors surfaced by the tracking backend.
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    /// Redis command failed.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Stored record could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored state is structurally invalid.
    #[error("Corrupt tracking state for {batch_id}: {reason}")]
    Corrupt { batch_id: String, reason: String },
}

/// Marks a chunk complete and derives the terminal status in one
/// transaction. Reading the counters in the same script as the SADD is
/// what prevents two concurrent final chunks from both (or neither)
/// closing the batch.
const COMPLETE_CHUNK_SCRIPT: &str = r#"
redis.call('SADD', KEYS[2], ARGV[1])
redis.call('EXPIRE', KEYS[2], ARGV[4])
local completed = redis.call('SCARD', KEYS[2])
redis.call('HSET', KEYS[1], 'completed_chunks', completed)
local status = redis.call('HGET', KEYS[1], 'status')
if status ~= 'IN_PROGRESS' and status ~= 'ACCEPTED' then
  return status
end
local total = tonumber(redis.call('HGET', KEYS[1], 'total_chunks') or '0')
if total > 0 and completed >= total then
  local failures = tonumber(redis.call('HGET', KEYS[1], 'failure_count') or '0')
    + tonumber(redis.call('HGET', KEYS[1], 'skipped_count') or '0')
  local successes = tonumber(redis.call('HGET', KEYS[1], 'success_count') or '0')
  local terminal
  if failures == 0 then
    terminal = 'COMPLETED'
  elseif successes == 0 then
    terminal = 'FAILED'
  else
    terminal = 'PARTIALLY_COMPLETED'
  end
  redis.call('HSET', KEYS[1], 'status', terminal, 'ended_at', ARGV[3])
  redis.call('SREM', KEYS[3], ARGV[2])
  return terminal
end
return status
"#;

/// Records one per-record outcome, refusing to mutate a batch that has
/// already reached a terminal status. ARGV[2], when non-empty, is a
/// serialized failure record pushed onto the failure list.
const RECORD_OUTCOME_SCRIPT: &str = r#"
local status = redis.call('HGET', KEYS[1], 'status')
if status == 'COMPLETED' or status == 'PARTIALLY_COMPLETED'
   or status == 'FAILED' or status == 'CANCELLED' then
  return 0
end
redis.call('HINCRBY', KEYS[1], ARGV[1], 1)
if ARGV[2] ~= '' then
  redis.call('RPUSH', KEYS[2], ARGV[2])
  redis.call('EXPIRE', KEYS[2], ARGV[3])
end
return 1
"#;

/// Cancels a non-terminal batch; terminal statuses are absorbing.
const CANCEL_SCRIPT: &str = r#"
local status = redis.call('HGET', KEYS[1], 'status')
if not status then
  return -1
end
if status == 'COMPLETED' or status == 'PARTIALLY_COMPLETED'
   or status == 'FAILED' or status == 'CANCELLED' then
  return 0
end
redis.call('HSET', KEYS[1], 'status', 'CANCELLED', 'ended_at', ARGV[1])
redis.call('SREM', KEYS[2], ARGV[2])
return 1
"#;

/// Distributed batch tracking store.
pub struct TrackingStore {
    conn: Option<MultiplexedConnection>,
    fallback: InMemoryTracker,
    batch_ttl_secs: u64,
    dlt_ttl_secs: u64,
    record_outcome_script: Script,
    complete_chunk_script: Script,
    cancel_script: Script,
}

impl TrackingStore {
    /// Connect to the Redis backing store.
    pub async fn connect(
        redis_url: &str,
        batch_ttl_secs: u64,
        dlt_ttl_secs: u64,
    ) -> Result<Self, TrackingError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!("Tracking store connected to Redis");
        Ok(Self {
            conn: Some(conn),
            fallback: InMemoryTracker::new(),
            batch_ttl_secs,
            dlt_ttl_secs,
            record_outcome_script: Script::new(RECORD_OUTCOME_SCRIPT),
            complete_chunk_script: Script::new(COMPLETE_CHUNK_SCRIPT),
            cancel_script: Script::new(CANCEL_SCRIPT),
        })
    }

    /// Build a store with no remote backing; all state is process-local.
    ///
    /// Used when Redis is unavailable at startup and in tests.
    #[must_use]
    pub fn in_memory(batch_ttl_secs: u64, dlt_ttl_secs: u64) -> Self {
        Self {
            conn: None,
            fallback: InMemoryTracker::new(),
            batch_ttl_secs,
            dlt_ttl_secs,
            record_outcome_script: Script::new(RECORD_OUTCOME_SCRIPT),
            complete_chunk_script: Script::new(COMPLETE_CHUNK_SCRIPT),
            cancel_script: Script::new(CANCEL_SCRIPT),
        }
    }

    /// Initialize tracking for a batch; no-op when already present.
    ///
    /// Called by whichever worker receives the first chunk of a batch.
    pub async fn initialize(
        &self,
        batch_id: &str,
        total_chunks: u32,
        total_records: u64,
        submitted_by: &str,
        source_filename: &str,
    ) {
        if let Err(e) = self
            .try_initialize(
                batch_id,
                total_chunks,
                total_records,
                submitted_by,
                source_filename,
            )
            .await
        {
            warn!(batch_id, error = %e, "Tracking initialize failed, using in-memory fallback");
            self.fallback.initialize(
                batch_id,
                total_chunks,
                total_records,
                submitted_by,
                source_filename,
            );
        }
    }

    async fn try_initialize(
        &self,
        batch_id: &str,
        total_chunks: u32,
        total_records: u64,
        submitted_by: &str,
        source_filename: &str,
    ) -> Result<(), TrackingError> {
        let Some(conn) = &self.conn else {
            return Err(no_connection());
        };
        let mut conn = conn.clone();
        let status_key = keys::batch_status(batch_id);

        // HSETNX on the id field is the idempotence guard: only the first
        // initializer writes the full hash.
        let fresh: bool = conn.hset_nx(&status_key, "batch_id", batch_id).await?;
        if !fresh {
            debug!(batch_id, "Batch already initialized");
            return Ok(());
        }

        let started_at = Utc::now().to_rfc3339();
        let mut pipe = redis::pipe();
        pipe.hset_multiple(
            &status_key,
            &[
                ("status", BatchStatus::InProgress.as_str().to_string()),
                ("total_chunks", total_chunks.to_string()),
                ("completed_chunks", "0".to_string()),
                ("total_records", total_records.to_string()),
                ("success_count", "0".to_string()),
                ("failure_count", "0".to_string()),
                ("skipped_count", "0".to_string()),
                ("started_at", started_at),
                ("submitted_by", submitted_by.to_string()),
                ("source_filename", source_filename.to_string()),
            ],
        )
        .ignore()
        .expire(&status_key, self.batch_ttl_secs as i64)
        .ignore()
        .sadd(keys::ACTIVE_BATCHES, batch_id)
        .ignore();
        let _: () = pipe.query_async(&mut conn).await?;

        info!(batch_id, total_chunks, total_records, "Batch initialized");
        Ok(())
    }

    /// Atomically record a successful ticket creation.
    pub async fn record_success(&self, batch_id: &str, ticket_number: &str) {
        if let Err(e) = self
            .try_record_outcome(batch_id, "success_count", None)
            .await
        {
            debug!(batch_id, ticket_number, error = %e, "In-memory success tracking");
            self.fallback.record_success(batch_id);
        }
    }

    /// Atomically record a failed ticket creation and append it to the
    /// batch failure list.
    pub async fn record_failure(
        &self,
        batch_id: &str,
        ticket_number: &str,
        error_code: BulkErrorCode,
        message: &str,
    ) {
        let record = FailureRecord::new(ticket_number, error_code, message);
        if let Err(e) = self
            .try_record_outcome(batch_id, "failure_count", Some(&record))
            .await
        {
            debug!(batch_id, ticket_number, error = %e, "In-memory failure tracking");
            self.fallback.record_failure(batch_id, record);
        }
    }

    /// Record a skipped outcome (already-existing ticket). The entry is
    /// still enumerable through the failure list but counts as skipped.
    pub async fn record_skipped(&self, batch_id: &str, ticket_number: &str, reason: &str) {
        let record = FailureRecord::new(ticket_number, BulkErrorCode::DuplicateTicket, reason);
        if let Err(e) = self
            .try_record_outcome(batch_id, "skipped_count", Some(&record))
            .await
        {
            debug!(batch_id, ticket_number, error = %e, "In-memory skip tracking");
            self.fallback.record_skipped(batch_id, ticket_number, reason);
        }
    }

    /// Run the guarded outcome script: counters only move while the
    /// batch is non-terminal, and an optional failure record rides along
    /// in the same transaction.
    async fn try_record_outcome(
        &self,
        batch_id: &str,
        counter_field: &str,
        failure: Option<&FailureRecord>,
    ) -> Result<(), TrackingError> {
        let Some(conn) = &self.conn else {
            return Err(no_connection());
        };
        let mut conn = conn.clone();
        let payload = match failure {
            Some(record) => serde_json::to_string(record)?,
            None => String::new(),
        };
        let applied: i64 = self
            .record_outcome_script
            .key(keys::batch_status(batch_id))
            .key(keys::batch_failures(batch_id))
            .arg(counter_field)
            .arg(payload)
            .arg(self.batch_ttl_secs)
            .invoke_async(&mut conn)
            .await?;
        if applied == 0 {
            debug!(batch_id, counter_field, "Outcome ignored for terminal batch");
        }
        Ok(())
    }

    /// Mark a chunk complete; when it was the last one, derive and stamp
    /// the terminal status and retire the batch from the active set.
    pub async fn complete_chunk(&self, batch_id: &str, chunk_index: u32) {
        let result: Result<String, TrackingError> = async {
            let Some(conn) = &self.conn else {
                return Err(no_connection());
            };
            let mut conn = conn.clone();
            let status: String = self
                .complete_chunk_script
                .key(keys::batch_status(batch_id))
                .key(keys::batch_progress(batch_id))
                .key(keys::ACTIVE_BATCHES)
                .arg(chunk_index)
                .arg(batch_id)
                .arg(Utc::now().to_rfc3339())
                .arg(self.batch_ttl_secs)
                .invoke_async(&mut conn)
                .await?;
            Ok(status)
        }
        .await;

        match result {
            Ok(status) => {
                debug!(batch_id, chunk_index, status = %status, "Chunk completed");
                if let Ok(status) = status.parse::<BatchStatus>() {
                    if status.is_terminal() {
                        info!(batch_id, status = %status, "Batch reached terminal status");
                    }
                }
            }
            Err(e) => {
                debug!(batch_id, chunk_index, error = %e, "In-memory chunk completion");
                self.fallback.complete_chunk(batch_id, chunk_index);
            }
        }
    }

    /// Cancel a batch. Advisory: in-flight chunks poll this flag at
    /// entry. Idempotent; returns whether a transition happened.
    pub async fn cancel(&self, batch_id: &str, reason: Option<&str>) -> bool {
        info!(batch_id, reason = reason.unwrap_or("-"), "Batch cancel requested");
        let result: Result<i64, TrackingError> = async {
            let Some(conn) = &self.conn else {
                return Err(no_connection());
            };
            let mut conn = conn.clone();
            let outcome: i64 = self
                .cancel_script
                .key(keys::batch_status(batch_id))
                .key(keys::ACTIVE_BATCHES)
                .arg(Utc::now().to_rfc3339())
                .arg(batch_id)
                .invoke_async(&mut conn)
                .await?;
            Ok(outcome)
        }
        .await;

        match result {
            Ok(outcome) => outcome == 1,
            Err(e) => {
                warn!(batch_id, error = %e, "In-memory cancel");
                self.fallback.cancel(batch_id)
            }
        }
    }

    /// Point-in-time snapshot of a batch, or `None` when unknown.
    pub async fn get(&self, batch_id: &str) -> Option<BatchState> {
        match self.try_get(batch_id).await {
            Ok(found @ Some(_)) => found,
            Ok(None) => self.fallback.get(batch_id),
            Err(e) => {
                debug!(batch_id, error = %e, "Falling back to in-memory batch lookup");
                self.fallback.get(batch_id)
            }
        }
    }

    async fn try_get(&self, batch_id: &str) -> Result<Option<BatchState>, TrackingError> {
        let Some(conn) = &self.conn else {
            return Err(no_connection());
        };
        let mut conn = conn.clone();
        let hash: HashMap<String, String> = conn.hgetall(keys::batch_status(batch_id)).await?;
        if hash.is_empty() {
            return Ok(None);
        }
        let indices: Vec<u32> = conn.smembers(keys::batch_progress(batch_id)).await?;
        Ok(Some(state_from_hash(batch_id, &hash, indices)?))
    }

    /// Current set of in-flight batch ids.
    pub async fn list_active(&self) -> Vec<String> {
        let result: Result<Vec<String>, TrackingError> = async {
            let Some(conn) = &self.conn else {
                return Err(no_connection());
            };
            let mut conn = conn.clone();
            Ok(conn.smembers(keys::ACTIVE_BATCHES).await?)
        }
        .await;

        match result {
            Ok(ids) => ids,
            Err(e) => {
                debug!(error = %e, "Falling back to in-memory active set");
                self.fallback.list_active()
            }
        }
    }

    /// Paginated failure list in insertion order, with the total count.
    pub async fn list_failures(
        &self,
        batch_id: &str,
        offset: usize,
        limit: usize,
    ) -> (Vec<FailureRecord>, usize) {
        let result: Result<(Vec<FailureRecord>, usize), TrackingError> = async {
            let Some(conn) = &self.conn else {
                return Err(no_connection());
            };
            let mut conn = conn.clone();
            let key = keys::batch_failures(batch_id);
            let total: usize = conn.llen(&key).await?;
            if limit == 0 || offset >= total {
                return Ok((Vec::new(), total));
            }
            let stop = (offset + limit - 1) as isize;
            let raw: Vec<String> = conn.lrange(&key, offset as isize, stop).await?;
            let mut records = Vec::with_capacity(raw.len());
            for item in raw {
                records.push(serde_json::from_str(&item)?);
            }
            Ok((records, total))
        }
        .await;

        match result {
            Ok(page) => page,
            Err(e) => {
                debug!(batch_id, error = %e, "Falling back to in-memory failure list");
                (
                    self.fallback.list_failures(batch_id, offset, limit),
                    self.fallback.failure_count(batch_id),
                )
            }
        }
    }

    /// Fire-and-forget append to a topic's dead-letter list.
    pub async fn append_dlt(&self, topic: &str, record: DltRecord) {
        let result: Result<(), TrackingError> = async {
            let Some(conn) = &self.conn else {
                return Err(no_connection());
            };
            let mut conn = conn.clone();
            let payload = serde_json::to_string(&record)?;
            let key = keys::dlt_list(topic);
            let mut pipe = redis::pipe();
            pipe.rpush(&key, payload)
                .ignore()
                .expire(&key, self.dlt_ttl_secs as i64)
                .ignore();
            let _: () = pipe.query_async(&mut conn).await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => info!(topic, key = %record.message_key, "Dead-letter record stored"),
            Err(e) => {
                warn!(topic, error = %e, "In-memory dead-letter tracking");
                self.fallback.append_dlt(topic, record);
            }
        }
    }

    /// Insertion-order snapshot of a topic's dead-letter list.
    pub async fn list_dlt(&self, topic: &str, limit: usize) -> Vec<DltRecord> {
        let result: Result<Vec<DltRecord>, TrackingError> = async {
            let Some(conn) = &self.conn else {
                return Err(no_connection());
            };
            let mut conn = conn.clone();
            if limit == 0 {
                return Ok(Vec::new());
            }
            let raw: Vec<String> = conn
                .lrange(keys::dlt_list(topic), 0, limit as isize - 1)
                .await?;
            let mut records = Vec::with_capacity(raw.len());
            for item in raw {
                records.push(serde_json::from_str(&item)?);
            }
            Ok(records)
        }
        .await;

        match result {
            Ok(records) => records,
            Err(e) => {
                debug!(topic, error = %e, "Falling back to in-memory DLT list");
                self.fallback.list_dlt(topic, limit)
            }
        }
    }
}

fn no_connection() -> TrackingError {
    TrackingError::Redis(redis::RedisError::from((
        redis::ErrorKind::IoError,
        "no Redis connection",
    )))
}

fn state_from_hash(
    batch_id: &str,
    hash: &HashMap<String, String>,
    indices: Vec<u32>,
) -> Result<BatchState, TrackingError> {
    let corrupt = |reason: &str| TrackingError::Corrupt {
        batch_id: batch_id.to_string(),
        reason: reason.to_string(),
    };

    let status = hash
        .get("status")
        .and_then(|s| s.parse::<BatchStatus>().ok())
        .ok_or_else(|| corrupt("missing or invalid status"))?;
    let started_at = hash
        .get("started_at")
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| corrupt("missing or invalid started_at"))?;
    let ended_at = hash
        .get("ended_at")
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc));

    let completed_chunk_indices: BTreeSet<u32> = indices.into_iter().collect();
    Ok(BatchState {
        batch_id: batch_id.to_string(),
        status,
        total_chunks: parse_field(hash, "total_chunks"),
        completed_chunks: completed_chunk_indices.len() as u32,
        total_records: parse_field(hash, "total_records"),
        success_count: parse_field(hash, "success_count"),
        failure_count: parse_field(hash, "failure_count"),
        skipped_count: parse_field(hash, "skipped_count"),
        started_at,
        ended_at,
        submitted_by: hash.get("submitted_by").cloned().unwrap_or_default(),
        source_filename: hash.get("source_filename").cloned().unwrap_or_default(),
        completed_chunk_indices,
    })
}

fn parse_field<T: std::str::FromStr + Default>(hash: &HashMap<String, String>, field: &str) -> T {
    hash.get(field)
        .and_then(|v| v.parse().ok())
        .unwrap_or_default()
}
