//! Indexer cache configuration from defaults or environment variables.

use crate::domain::{ChainSpec, DEFAULT_SLOTS_PER_EPOCH};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Explorer-state key under which the sync watermark is stored.
pub const SYNC_STATE_KEY: &str = "indexer.syncstate";

/// Indexer cache configuration
#[derive(Clone, Debug)]
pub struct IndexerCacheConfig {
    /// Slots per epoch of the indexed chain
    pub slots_per_epoch: u64,
    /// Persist finalized data; read-only instances only evict
    pub write_db: bool,
    /// Capacity of the finalized-head wakeup channel
    pub trigger_capacity: usize,
    /// Cache loop wakes at least this often
    pub idle_poll_interval: Duration,
    /// Pause after a failed cache pass
    pub retry_delay: Duration,
    /// Concurrent validator set loads
    pub validator_loading_limit: usize,
    /// Sync watermark key
    pub sync_state_key: String,
    /// Log level filter (trace, debug, info, warn, error)
    pub log_level: String,
    /// JSON formatted logs
    pub json_logs: bool,
}

impl Default for IndexerCacheConfig {
    fn default() -> Self {
        Self {
            slots_per_epoch: DEFAULT_SLOTS_PER_EPOCH,
            write_db: true,
            trigger_capacity: 10,
            idle_poll_interval: Duration::from_secs(30),
            retry_delay: Duration::from_secs(10),
            validator_loading_limit: 2,
            sync_state_key: SYNC_STATE_KEY.to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl IndexerCacheConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `QC_INDEXER_SLOTS_PER_EPOCH` (default: 32)
    /// - `QC_INDEXER_WRITE_DB` (default: true)
    /// - `QC_INDEXER_TRIGGER_CAPACITY` (default: 10)
    /// - `QC_INDEXER_IDLE_POLL_SECS` (default: 30)
    /// - `QC_INDEXER_RETRY_DELAY_SECS` (default: 10)
    /// - `QC_INDEXER_VALIDATOR_LOADING_LIMIT` (default: 2)
    /// - `QC_LOG_LEVEL` or `RUST_LOG` (default: info)
    /// - `QC_JSON_LOGS` (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            slots_per_epoch: env_or("QC_INDEXER_SLOTS_PER_EPOCH", defaults.slots_per_epoch),
            write_db: env_or("QC_INDEXER_WRITE_DB", defaults.write_db),
            trigger_capacity: env_or("QC_INDEXER_TRIGGER_CAPACITY", defaults.trigger_capacity),
            idle_poll_interval: Duration::from_secs(env_or(
                "QC_INDEXER_IDLE_POLL_SECS",
                defaults.idle_poll_interval.as_secs(),
            )),
            retry_delay: Duration::from_secs(env_or(
                "QC_INDEXER_RETRY_DELAY_SECS",
                defaults.retry_delay.as_secs(),
            )),
            validator_loading_limit: env_or(
                "QC_INDEXER_VALIDATOR_LOADING_LIMIT",
                defaults.validator_loading_limit,
            ),
            sync_state_key: defaults.sync_state_key,
            log_level: env::var("QC_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or(defaults.log_level),
            json_logs: env_or("QC_JSON_LOGS", defaults.json_logs),
        }
    }

    pub fn chain_spec(&self) -> ChainSpec {
        ChainSpec::new(self.slots_per_epoch)
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("[qc-18] Ignoring invalid {}={:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}
