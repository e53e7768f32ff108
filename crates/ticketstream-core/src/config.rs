//! Pipeline configuration.
//!
//! Every tunable of the bulk pipeline lives in [`BulkConfig`], loadable
//! from `TICKETSTREAM_*` environment variables or assembled through the
//! builder. Values fail fast at load time when unparseable.

use std::env;
use std::time::Duration;

/// Which field keys chunk events on the partitioned log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartitionKeyMode {
    /// Key by `{batch_id}-CHUNK-{index}`: uniform spread, no locality.
    #[default]
    ChunkKey,
    /// Key by the first record's customer id: locality over spread.
    CustomerId,
}

impl PartitionKeyMode {
    fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "CHUNK_KEY" => Ok(Self::ChunkKey),
            "CUSTOMER_ID" => Ok(Self::CustomerId),
            _ => Err(ConfigError::Invalid {
                var: "TICKETSTREAM_PARTITION_KEY_MODE".to_string(),
                reason: format!("Unknown mode: {s}"),
            }),
        }
    }
}

/// Configuration error raised during environment loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A value could not be parsed.
    #[error("Configuration invalid for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Tunables for the bulk processing pipeline.
#[derive(Debug, Clone)]
pub struct BulkConfig {
    /// Records per chunk.
    pub chunk_size: usize,
    /// Maximum accepted records per submission.
    pub max_records: usize,
    /// Maximum upload size in MiB.
    pub max_file_size_mib: u64,
    /// Chunk-processing workers per process.
    pub concurrency: usize,
    /// Upper bound on records fetched per poll.
    pub max_poll_records: usize,
    /// Retries after the first delivery before dead-lettering.
    pub max_attempts: u32,
    /// First retry backoff.
    pub initial_interval_ms: u64,
    /// Backoff multiplier.
    pub multiplier: f64,
    /// Backoff cap.
    pub max_interval_ms: u64,
    /// Producer publish timeout.
    pub producer_send_timeout_s: u64,
    /// Ticket read-cache TTL.
    pub cache_ttl_minutes: u64,
    /// Batch tracking state TTL.
    pub batch_ttl_hours: u64,
    /// Dead-letter inspection list TTL.
    pub dlt_ttl_days: u64,
    /// Partition key selection.
    pub partition_key_mode: PartitionKeyMode,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            max_records: 10_000,
            max_file_size_mib: 10,
            concurrency: 3,
            max_poll_records: 100,
            max_attempts: 3,
            initial_interval_ms: 1_000,
            multiplier: 2.0,
            max_interval_ms: 10_000,
            producer_send_timeout_s: 30,
            cache_ttl_minutes: 30,
            batch_ttl_hours: 24,
            dlt_ttl_days: 7,
            partition_key_mode: PartitionKeyMode::ChunkKey,
        }
    }
}

impl BulkConfig {
    /// Maximum upload size in bytes.
    #[must_use]
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mib * 1024 * 1024
    }

    /// Producer publish timeout as a [`Duration`].
    #[must_use]
    pub fn producer_send_timeout(&self) -> Duration {
        Duration::from_secs(self.producer_send_timeout_s)
    }

    /// Batch tracking TTL in seconds.
    #[must_use]
    pub fn batch_ttl_secs(&self) -> u64 {
        self.batch_ttl_hours * 3600
    }

    /// DLT list TTL in seconds.
    #[must_use]
    pub fn dlt_ttl_secs(&self) -> u64 {
        self.dlt_ttl_days * 24 * 3600
    }

    /// Load configuration from `TICKETSTREAM_*` environment variables,
    /// falling back to defaults for unset values.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        read_env("TICKETSTREAM_CHUNK_SIZE", &mut cfg.chunk_size)?;
        read_env("TICKETSTREAM_MAX_RECORDS", &mut cfg.max_records)?;
        read_env("TICKETSTREAM_MAX_FILE_SIZE_MIB", &mut cfg.max_file_size_mib)?;
        read_env("TICKETSTREAM_CONCURRENCY", &mut cfg.concurrency)?;
        read_env("TICKETSTREAM_MAX_POLL_RECORDS", &mut cfg.max_poll_records)?;
        read_env("TICKETSTREAM_MAX_ATTEMPTS", &mut cfg.max_attempts)?;
        read_env(
            "TICKETSTREAM_INITIAL_INTERVAL_MS",
            &mut cfg.initial_interval_ms,
        )?;
        read_env("TICKETSTREAM_MULTIPLIER", &mut cfg.multiplier)?;
        read_env("TICKETSTREAM_MAX_INTERVAL_MS", &mut cfg.max_interval_ms)?;
        read_env(
            "TICKETSTREAM_PRODUCER_SEND_TIMEOUT_S",
            &mut cfg.producer_send_timeout_s,
        )?;
        read_env("TICKETSTREAM_CACHE_TTL_MINUTES", &mut cfg.cache_ttl_minutes)?;
        read_env("TICKETSTREAM_BATCH_TTL_HOURS", &mut cfg.batch_ttl_hours)?;
        read_env("TICKETSTREAM_DLT_TTL_DAYS", &mut cfg.dlt_ttl_days)?;
        if let Ok(v) = env::var("TICKETSTREAM_PARTITION_KEY_MODE") {
            cfg.partition_key_mode = PartitionKeyMode::parse(&v)?;
        }
        Ok(cfg)
    }

    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> BulkConfigBuilder {
        BulkConfigBuilder::default()
    }
}

fn read_env<T: std::str::FromStr>(var: &str, target: &mut T) -> Result<(), ConfigError>
where
    T::Err: std::fmt::Display,
{
    if let Ok(raw) = env::var(var) {
        *target = raw.parse().map_err(|e| ConfigError::Invalid {
            var: var.to_string(),
            reason: format!("{e}"),
        })?;
    }
    Ok(())
}

/// Builder for [`BulkConfig`].
#[derive(Debug, Default)]
pub struct BulkConfigBuilder {
    cfg: Option<BulkConfig>,
}

impl BulkConfigBuilder {
    fn cfg(&mut self) -> &mut BulkConfig {
        self.cfg.get_or_insert_with(BulkConfig::default)
    }

    #[must_use]
    pub fn chunk_size(mut self, n: usize) -> Self {
        self.cfg().chunk_size = n;
        self
    }

    #[must_use]
    pub fn max_records(mut self, n: usize) -> Self {
        self.cfg().max_records = n;
        self
    }

    #[must_use]
    pub fn max_file_size_mib(mut self, n: u64) -> Self {
        self.cfg().max_file_size_mib = n;
        self
    }

    #[must_use]
    pub fn concurrency(mut self, n: usize) -> Self {
        self.cfg().concurrency = n;
        self
    }

    #[must_use]
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.cfg().max_attempts = n;
        self
    }

    #[must_use]
    pub fn backoff(mut self, initial_ms: u64, multiplier: f64, max_ms: u64) -> Self {
        let cfg = self.cfg();
        cfg.initial_interval_ms = initial_ms;
        cfg.multiplier = multiplier;
        cfg.max_interval_ms = max_ms;
        self
    }

    #[must_use]
    pub fn partition_key_mode(mut self, mode: PartitionKeyMode) -> Self {
        self.cfg().partition_key_mode = mode;
        self
    }

    #[must_use]
    pub fn build(mut self) -> BulkConfig {
        self.cfg.take().unwrap_or_default()
    }
}
