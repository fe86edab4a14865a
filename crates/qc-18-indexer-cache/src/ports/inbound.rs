//! Driving Ports (API - Inbound)
//!
//! Surface used by the head-following code to feed blocks and epoch stats
//! into the cache and to query canonical state back out.

use crate::domain::{CachedBlock, EpochStats, Root};
use crate::ports::outbound::CanonicalBlockMap;
use std::sync::Arc;

/// Primary Indexer Cache API
pub trait IndexerCacheApi: Send + Sync {
    /// Record a new finalized checkpoint. Ignored unless `epoch` is strictly
    /// greater than the current one; otherwise wakes the cache loop.
    fn set_finalized_head(&self, epoch: i64, root: Root);

    /// Latest finalized checkpoint, `(-1, None)` before the first one
    fn get_finalized_head(&self) -> (i64, Option<Root>);

    /// Look up a block, inserting an empty one if unknown.
    ///
    /// Returns the block and whether it was created by this call.
    fn create_or_get_cached_block(&self, root: Root, slot: u64) -> (Arc<CachedBlock>, bool);

    fn get_cached_block(&self, root: &Root) -> Option<Arc<CachedBlock>>;

    /// All competing blocks cached for `slot`
    fn get_cached_blocks_by_slot(&self, slot: u64) -> Vec<Arc<CachedBlock>>;

    fn remove_cached_block(&self, block: &CachedBlock);

    /// Look up epoch stats for one fork, inserting empty stats if unknown.
    fn create_or_get_epoch_stats(
        &self,
        epoch: u64,
        dependent_root: Option<Root>,
    ) -> (Arc<EpochStats>, bool);

    /// Stats for `(epoch, dependent_root)`; without a dependent root, the
    /// first stats cached for the epoch.
    fn get_epoch_stats(&self, epoch: u64, dependent_root: Option<&Root>)
        -> Option<Arc<EpochStats>>;

    fn remove_epoch_stats(&self, stats: &EpochStats);

    /// Canonical block per slot of `epoch` on the chain ending in `head`
    /// (the finalized root when `None`).
    fn get_canonical_block_map(&self, epoch: u64, head: Option<Root>) -> CanonicalBlockMap;
}
