//! Cache persistence hook and janitor

use super::IndexerCache;
use crate::error::IndexerResult;
use crate::metrics;
use crate::ports::inbound::IndexerCacheApi;
use crate::ports::outbound::{IndexerStore, Synchronizer, VoteAggregator};
use tracing::info;

impl<S, A, Y> IndexerCache<S, A, Y>
where
    S: IndexerStore,
    A: VoteAggregator,
    Y: Synchronizer,
{
    /// Extension point for snapshotting unfinalized state. Runs once per
    /// processed-epoch advance and currently writes nothing.
    pub(super) async fn process_cache_persistence(&self) -> IndexerResult<()> {
        info!("[qc-18] Processing cache persistence");
        Ok(())
    }

    /// Evict every block and epoch stats entry at or below `ceiling`.
    pub(super) fn process_cache_cleanup(&self, ceiling: i64) -> IndexerResult<()> {
        let blocks = self.blocks_at_or_below(ceiling);
        let stats: Vec<_> = self
            .epoch_stats
            .read()
            .iter()
            .filter(|(epoch, _)| **epoch as i64 <= ceiling)
            .flat_map(|(_, entries)| entries.iter().cloned())
            .collect();

        info!(
            "[qc-18] Cache cleanup: remove {} blocks, {} epoch stats",
            blocks.len(),
            stats.len()
        );
        for block in &blocks {
            self.remove_cached_block(block);
        }
        for entry in &stats {
            self.remove_epoch_stats(entry);
        }
        metrics::record_cleanup(blocks.len() as u64, stats.len() as u64);
        Ok(())
    }
}
