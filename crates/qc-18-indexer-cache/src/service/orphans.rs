//! Orphan reaper
//!
//! Blocks still cached at or below `processed_epoch` were not on the
//! finalized chain. New ones are archived as orphaned; roots the store
//! already knows (canonical or a previous sweep) are only dropped. Epochs
//! handed to the synchronizer at startup are left to it and to cleanup.

use super::IndexerCache;
use crate::domain::{format_root, BlockRecord, CachedBlock, OrphanedBlockRecord, Root};
use crate::error::IndexerResult;
use crate::metrics;
use crate::ports::inbound::IndexerCacheApi;
use crate::ports::outbound::{IndexerStore, StoreTransaction, Synchronizer, VoteAggregator};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

impl<S, A, Y> IndexerCache<S, A, Y>
where
    S: IndexerStore,
    A: VoteAggregator,
    Y: Synchronizer,
{
    pub(super) fn blocks_at_or_below(&self, epoch: i64) -> Vec<Arc<CachedBlock>> {
        let state = self.state.read();
        state
            .slot_map
            .iter()
            .filter(|(slot, _)| self.epoch_of_slot(**slot) as i64 <= epoch)
            .flat_map(|(_, blocks)| blocks.iter().cloned())
            .collect()
    }

    pub(super) async fn process_orphaned_blocks(&self, processed_epoch: i64) -> IndexerResult<()> {
        let handoff_epoch = self.state.read().sync_handoff_epoch;
        let mut candidates: Vec<_> = self
            .blocks_at_or_below(processed_epoch)
            .into_iter()
            .filter(|block| self.epoch_of_slot(block.slot) as i64 > handoff_epoch)
            .collect();
        candidates.sort_by_key(|block| block.slot);
        info!(
            "[qc-18] Processing {} non-canonical blocks (epoch <= {})",
            candidates.len(),
            processed_epoch
        );
        if candidates.is_empty() {
            return Ok(());
        }

        let roots: Vec<Root> = candidates.iter().map(|block| block.root).collect();
        let mut known = HashSet::new();
        for block_ref in self.store.get_block_orphaned_refs(&roots).await? {
            if block_ref.orphaned {
                debug!(
                    "[qc-18] Processed duplicate orphaned block: {}",
                    format_root(&block_ref.root)
                );
            } else {
                warn!(
                    "[qc-18] Processed duplicate canonical block in orphaned handler: {}",
                    format_root(&block_ref.root)
                );
            }
            known.insert(block_ref.root);
        }

        let orphaned: Vec<_> = candidates
            .iter()
            .filter(|block| !known.contains(&block.root))
            .collect();
        if !orphaned.is_empty() {
            let mut tx = self.store.begin().await.map_err(|e| {
                error!("[qc-18] Error starting db transaction: {}", e);
                e
            })?;
            for block in &orphaned {
                let epoch = self.epoch_of_slot(block.slot);
                let epoch_stats = self.get_epoch_stats(epoch, None);
                let mut record = BlockRecord::build(block, epoch, epoch_stats.as_deref());
                record.orphaned = true;
                tx.insert_block(record)?;
                tx.insert_orphaned_block(OrphanedBlockRecord::build(block)?)?;
            }
            tx.commit().await.map_err(|e| {
                error!("[qc-18] Error committing orphaned blocks: {}", e);
                e
            })?;
        }

        for block in &candidates {
            self.remove_cached_block(block);
        }
        metrics::record_orphan_sweep(orphaned.len() as u64, known.len() as u64);
        debug!(
            "[qc-18] Orphan sweep done: {} archived, {} already stored",
            orphaned.len(),
            known.len()
        );
        Ok(())
    }
}
