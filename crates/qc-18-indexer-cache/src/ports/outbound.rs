//! Driven Ports (SPI - Outbound Dependencies)
//!
//! Collaborators the cache consumes: the relational store, the vote
//! aggregator and the historical synchronizer.

use crate::domain::{
    BlockOrphanedRef, BlockRecord, CachedBlock, EpochRecord, EpochStats, EpochVotes,
    OrphanedBlockRecord, Root, SyncState, UnfinalizedBlockHeader, UnfinalizedDutyRef,
};
use crate::error::IndexerResult;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Canonical blocks keyed by slot.
pub type CanonicalBlockMap = BTreeMap<u64, Arc<CachedBlock>>;

/// Persistent store behind the indexer.
///
/// Reads happen outside any transaction. Writes are grouped into a
/// `StoreTransaction` that the cache begins and commits; dropping a
/// transaction without committing rolls it back.
#[async_trait]
pub trait IndexerStore: Send + Sync {
    type Transaction: StoreTransaction;

    /// Unfinalized headers written before the last shutdown
    async fn load_unfinalized_block_headers(&self) -> IndexerResult<Vec<UnfinalizedBlockHeader>>;

    /// Unfinalized epoch duty references written before the last shutdown
    async fn load_unfinalized_epoch_duty_refs(&self) -> IndexerResult<Vec<UnfinalizedDutyRef>>;

    /// Read a persisted sync watermark
    async fn get_sync_state(&self, key: &str) -> IndexerResult<Option<SyncState>>;

    /// Known orphaned/canonical status for any of `roots` already stored
    async fn get_block_orphaned_refs(&self, roots: &[Root])
        -> IndexerResult<Vec<BlockOrphanedRef>>;

    /// Open a write transaction
    async fn begin(&self) -> IndexerResult<Self::Transaction>;
}

/// One atomic unit of writes.
#[async_trait]
pub trait StoreTransaction: Send {
    fn insert_block(&mut self, block: BlockRecord) -> IndexerResult<()>;

    fn insert_orphaned_block(&mut self, record: OrphanedBlockRecord) -> IndexerResult<()>;

    /// Canonical blocks, epoch stats and vote tallies of a finalized epoch
    fn persist_epoch_data(&mut self, record: EpochRecord) -> IndexerResult<()>;

    fn set_sync_state(&mut self, key: &str, state: SyncState) -> IndexerResult<()>;

    async fn commit(self) -> IndexerResult<()>;
}

/// Vote aggregation over a canonical block map.
///
/// Pure from the cache's point of view; it is called while the driver is
/// processing an epoch.
pub trait VoteAggregator: Send + Sync {
    fn aggregate_epoch_votes(
        &self,
        canonical_blocks: &CanonicalBlockMap,
        epoch: u64,
        epoch_stats: &EpochStats,
        target_root: Option<Root>,
    ) -> EpochVotes;
}

/// Historical backfill of epochs the live cache never saw.
pub trait Synchronizer: Send + Sync {
    /// Start syncing from `from_epoch`. Fire-and-forget and idempotent.
    fn start_sync(&self, from_epoch: u64);

    /// True if a running sync already covers `epoch` or later
    fn is_epoch_ahead(&self, epoch: u64) -> bool;

    /// True while a backfill is in progress; the driver leaves the sync
    /// watermark to the synchronizer in that case.
    fn is_running(&self) -> bool;
}
