//! # Indexer Cache Metrics
//!
//! Prometheus metrics for the finalization pipeline.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! qc-18-indexer-cache = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `indexer_epochs_finalized_total` - Counter of epochs persisted by the driver
//! - `indexer_orphaned_blocks_total` - Counter of blocks archived as orphaned
//! - `indexer_duplicate_blocks_total` - Counter of swept blocks already in storage
//! - `indexer_evicted_blocks_total` - Counter of blocks evicted by cleanup
//! - `indexer_evicted_epoch_stats_total` - Counter of epoch stats evicted by cleanup
//! - `indexer_cache_loop_errors_total` - Counter of failed cache passes
//! - `indexer_processed_epoch` - Gauge of the processed epoch watermark
//! - `indexer_finalized_epoch` - Gauge of the latest finalized epoch
//! - `indexer_cached_blocks` - Gauge of blocks held in the cache

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{register_int_counter, register_int_gauge, IntCounter, IntGauge};

#[cfg(feature = "metrics")]
lazy_static! {
    pub static ref EPOCHS_FINALIZED: IntCounter = register_int_counter!(
        "indexer_epochs_finalized_total",
        "Total number of finalized epochs persisted"
    )
    .expect("Failed to create EPOCHS_FINALIZED metric");

    pub static ref ORPHANED_BLOCKS: IntCounter = register_int_counter!(
        "indexer_orphaned_blocks_total",
        "Total number of blocks archived as orphaned"
    )
    .expect("Failed to create ORPHANED_BLOCKS metric");

    pub static ref DUPLICATE_BLOCKS: IntCounter = register_int_counter!(
        "indexer_duplicate_blocks_total",
        "Total number of swept blocks that were already stored"
    )
    .expect("Failed to create DUPLICATE_BLOCKS metric");

    pub static ref EVICTED_BLOCKS: IntCounter = register_int_counter!(
        "indexer_evicted_blocks_total",
        "Total number of blocks evicted by cache cleanup"
    )
    .expect("Failed to create EVICTED_BLOCKS metric");

    pub static ref EVICTED_EPOCH_STATS: IntCounter = register_int_counter!(
        "indexer_evicted_epoch_stats_total",
        "Total number of epoch stats evicted by cache cleanup"
    )
    .expect("Failed to create EVICTED_EPOCH_STATS metric");

    pub static ref CACHE_LOOP_ERRORS: IntCounter = register_int_counter!(
        "indexer_cache_loop_errors_total",
        "Total number of failed cache passes"
    )
    .expect("Failed to create CACHE_LOOP_ERRORS metric");

    pub static ref PROCESSED_EPOCH: IntGauge = register_int_gauge!(
        "indexer_processed_epoch",
        "Highest epoch persisted by the finalization driver"
    )
    .expect("Failed to create PROCESSED_EPOCH metric");

    pub static ref FINALIZED_EPOCH: IntGauge = register_int_gauge!(
        "indexer_finalized_epoch",
        "Latest finalized epoch reported by the chain"
    )
    .expect("Failed to create FINALIZED_EPOCH metric");

    pub static ref CACHED_BLOCKS: IntGauge = register_int_gauge!(
        "indexer_cached_blocks",
        "Number of blocks held in the unfinalized cache"
    )
    .expect("Failed to create CACHED_BLOCKS metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

#[cfg(feature = "metrics")]
pub fn record_epoch_finalized(epoch: u64) {
    EPOCHS_FINALIZED.inc();
    PROCESSED_EPOCH.set(epoch as i64);
}

#[cfg(feature = "metrics")]
pub fn record_orphan_sweep(orphaned: u64, duplicates: u64) {
    ORPHANED_BLOCKS.inc_by(orphaned);
    DUPLICATE_BLOCKS.inc_by(duplicates);
}

#[cfg(feature = "metrics")]
pub fn record_cleanup(blocks: u64, epoch_stats: u64) {
    EVICTED_BLOCKS.inc_by(blocks);
    EVICTED_EPOCH_STATS.inc_by(epoch_stats);
}

#[cfg(feature = "metrics")]
pub fn record_cache_loop_error() {
    CACHE_LOOP_ERRORS.inc();
}

#[cfg(feature = "metrics")]
pub fn set_processed_epoch(epoch: i64) {
    PROCESSED_EPOCH.set(epoch);
}

#[cfg(feature = "metrics")]
pub fn set_finalized_epoch(epoch: i64) {
    FINALIZED_EPOCH.set(epoch);
}

#[cfg(feature = "metrics")]
pub fn set_cached_blocks(count: usize) {
    CACHED_BLOCKS.set(count as i64);
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_epoch_finalized(_epoch: u64) {}

#[cfg(not(feature = "metrics"))]
pub fn record_orphan_sweep(_orphaned: u64, _duplicates: u64) {}

#[cfg(not(feature = "metrics"))]
pub fn record_cleanup(_blocks: u64, _epoch_stats: u64) {}

#[cfg(not(feature = "metrics"))]
pub fn record_cache_loop_error() {}

#[cfg(not(feature = "metrics"))]
pub fn set_processed_epoch(_epoch: i64) {}

#[cfg(not(feature = "metrics"))]
pub fn set_finalized_epoch(_epoch: i64) {}

#[cfg(not(feature = "metrics"))]
pub fn set_cached_blocks(_count: usize) {}
