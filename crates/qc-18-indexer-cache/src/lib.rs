//! # qc-18-indexer-cache
//!
//! In-memory finalization pipeline of the beacon chain indexer.
//!
//! ## Overview
//!
//! This subsystem provides:
//! - **Unfinalized block tree**: every observed block, forks included, keyed
//!   by root and by slot
//! - **Canonical resolution**: parent-root descent from the finalized head
//! - **Finalization**: one atomic store transaction per finalized epoch
//! - **Orphan archival**: leftovers of finalized epochs stored as orphaned
//! - **Cleanup**: eviction once an epoch is durable
//!
//! ## Architecture
//!
//! ```text
//! Head following ──blocks / epoch stats / finalized head──→ IndexerCache
//!                                                               │
//!                                  cache loop (one task) ───────┤
//!                                                               ├── IndexerStore (transactions)
//!                                                               ├── VoteAggregator
//!                                                               └── Synchronizer (backfill)
//! ```
//!
//! ## Watermarks
//!
//! | Watermark | Meaning |
//! |-----------|---------|
//! | `finalized_epoch` | Latest finalized checkpoint reported by head following |
//! | `processed_epoch` | Highest epoch persisted; `-2` until loaded from storage |
//! | `persist_epoch` | Last epoch the persistence hook ran for |
//! | `cleanup_epoch` | Everything at or below is evicted |
//!
//! ## Example
//!
//! ```rust,ignore
//! use qc_18_indexer_cache::{IndexerCache, IndexerCacheConfig};
//! use qc_18_indexer_cache::ports::inbound::IndexerCacheApi;
//!
//! let config = IndexerCacheConfig::from_env();
//! qc_18_indexer_cache::telemetry::init_tracing(&config);
//!
//! let cache = IndexerCache::new(config, store, aggregator, synchronizer).await;
//! let _loop = cache.start()?;
//!
//! // Feed blocks from head following
//! let (block, _) = cache.create_or_get_cached_block(root, slot);
//! block.set_header(header);
//! cache.set_finalized_head(epoch, finalized_root);
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;
pub mod telemetry;

/// Block-tree builders for tests
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::IndexerCacheConfig;
pub use domain::{
    BeaconBlockHeader, BlockRecord, CachedBlock, ChainSpec, EpochRecord, EpochStats,
    EpochVotes, OrphanedBlockRecord, Root, SignedBlockHeader, ValidatorSet, ValidatorStats,
};
pub use error::{IndexerError, IndexerResult};
pub use ports::inbound::IndexerCacheApi;
pub use ports::outbound::{
    CanonicalBlockMap, IndexerStore, StoreTransaction, Synchronizer, VoteAggregator,
};
pub use service::{IndexerCache, EPOCH_UNKNOWN, NO_EPOCH};
