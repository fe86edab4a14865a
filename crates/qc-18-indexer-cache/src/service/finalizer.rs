//! Finalization driver
//!
//! Advances `processed_epoch` towards the finalized checkpoint one epoch at a
//! time. Each epoch is persisted in a single transaction together with the
//! sync watermark, and its canonical blocks leave the cache only after that
//! transaction committed.

use super::{IndexerCache, EPOCH_UNKNOWN, NO_EPOCH};
use crate::domain::{format_opt_root, BlockRecord, EpochRecord, Root, SyncState};
use crate::error::{IndexerError, IndexerResult};
use crate::metrics;
use crate::ports::inbound::IndexerCacheApi;
use crate::ports::outbound::{IndexerStore, StoreTransaction, Synchronizer, VoteAggregator};
use tracing::{debug, error, info, warn};

impl<S, A, Y> IndexerCache<S, A, Y>
where
    S: IndexerStore,
    A: VoteAggregator,
    Y: Synchronizer,
{
    /// Resolve `processed_epoch` on the first pass after startup.
    ///
    /// The persisted watermark is the starting point. When the finalized
    /// chain in the cache does not reach back to the next epoch, historical
    /// epochs are handed to the synchronizer and live processing resumes at
    /// the finalized epoch. A watermark ahead of the finalized checkpoint is
    /// held back until the checkpoint catches up.
    pub(super) async fn load_processed_epoch(&self) -> IndexerResult<()> {
        let (processed, finalized) = {
            let state = self.state.read();
            (state.processed_epoch, state.finalized_epoch)
        };
        if processed != EPOCH_UNKNOWN || finalized < 0 {
            return Ok(());
        }

        let loaded = self
            .store
            .get_sync_state(&self.config.sync_state_key)
            .await?
            .map_or(NO_EPOCH, |state| state.epoch as i64);
        let next_epoch = (loaded + 1).max(0) as u64;
        debug!(
            "[qc-18] Loaded sync state: epoch {} (finalized {})",
            loaded, finalized
        );
        if loaded > finalized {
            warn!(
                "[qc-18] Sync state epoch {} is ahead of finalized epoch {}, waiting",
                loaded, finalized
            );
            return Ok(());
        }

        let cache_covers_next = self
            .oldest_finalized_ancestor()
            .is_some_and(|block| self.epoch_of_slot(block.slot) <= next_epoch);
        if loaded < finalized && !cache_covers_next {
            info!(
                "[qc-18] Epochs {}..={} not in cache, handing them to the synchronizer",
                next_epoch, finalized
            );
            self.start_synchronizer(next_epoch);
            self.state.write().sync_handoff_epoch = finalized;
            self.set_processed_epoch(finalized);
        } else {
            self.set_processed_epoch(loaded);
        }
        Ok(())
    }

    /// Persist every finalized epoch not yet processed, in order.
    pub(super) async fn process_finalized_epochs(&self) -> IndexerResult<()> {
        loop {
            let (processed, finalized) = {
                let state = self.state.read();
                (state.processed_epoch, state.finalized_epoch)
            };
            debug!(
                "[qc-18] Check finalized processing {} < {}",
                processed, finalized
            );
            if processed < NO_EPOCH || processed >= finalized {
                return Ok(());
            }
            self.process_finalized_epoch((processed + 1) as u64).await?;
        }
    }

    /// Target checkpoint and dependent root of `epoch`, from its first
    /// canonical block on the finalized chain.
    fn epoch_checkpoint(&self, epoch: u64) -> (Option<Root>, Option<Root>) {
        let Some(first_block) = self.first_canonical_block(epoch, None) else {
            warn!("[qc-18] Could not find epoch {} target (no block found)", epoch);
            return (None, None);
        };
        let dependent_root = first_block.parent_root();
        let target_root = if first_block.slot == self.chain.epoch_start_slot(epoch) {
            Some(first_block.root)
        } else {
            dependent_root
        };
        (target_root, dependent_root)
    }

    pub(super) async fn process_finalized_epoch(&self, epoch: u64) -> IndexerResult<()> {
        let expected = self.processed_epoch() + 1;
        if expected != epoch as i64 {
            return Err(IndexerError::EpochOutOfOrder {
                expected,
                actual: epoch,
            });
        }

        let (target_root, dependent_root) = self.epoch_checkpoint(epoch);
        info!(
            "[qc-18] Processing finalized epoch {}: target {}, dependent {}",
            epoch,
            format_opt_root(target_root.as_ref()),
            format_opt_root(dependent_root.as_ref())
        );

        let (epoch_stats, is_new_stats) = self.create_or_get_epoch_stats(epoch, dependent_root);
        if is_new_stats {
            warn!(
                "[qc-18] No epoch stats cached for finalized epoch {}, persisting without duties",
                epoch
            );
        }

        // Attestations for `epoch` are included in blocks of the next epoch.
        let mut canonical_blocks = self.canonical_block_map(epoch, None);
        canonical_blocks.extend(self.canonical_block_map(epoch + 1, None));

        let votes = self.aggregator.aggregate_epoch_votes(
            &canonical_blocks,
            epoch,
            &epoch_stats,
            target_root,
        );

        // Fall back to the last fetched validator set when no loader filled
        // this epoch in.
        let validator_stats = epoch_stats.validator_stats().or_else(|| {
            let stats = self.get_last_validators()?.stats_at(epoch);
            epoch_stats.set_validator_stats(stats);
            Some(stats)
        });
        if let Some(stats) = &validator_stats {
            info!(
                "[qc-18] Epoch {} stats: {} validators ({})",
                epoch, stats.validator_count, stats.eligible_amount
            );
        }
        info!(
            "[qc-18] Epoch {} votes: target {} + {} = {}",
            epoch,
            votes.current_epoch.target_vote_amount,
            votes.next_epoch.target_vote_amount,
            votes.target_total()
        );
        info!(
            "[qc-18] Epoch {} votes: head {} + {} = {}",
            epoch,
            votes.current_epoch.head_vote_amount,
            votes.next_epoch.head_vote_amount,
            votes.head_total()
        );
        info!(
            "[qc-18] Epoch {} votes: total {} + {} = {}",
            epoch,
            votes.current_epoch.total_vote_amount,
            votes.next_epoch.total_vote_amount,
            votes.vote_total()
        );

        let epoch_blocks: Vec<_> = canonical_blocks
            .values()
            .filter(|block| self.epoch_of_slot(block.slot) == epoch)
            .cloned()
            .collect();
        let record = EpochRecord {
            epoch,
            target_root,
            dependent_root,
            blocks: epoch_blocks
                .iter()
                .map(|block| BlockRecord::build(block, epoch, Some(&*epoch_stats)))
                .collect(),
            validator_stats,
            votes,
        };

        let mut tx = self.store.begin().await.map_err(|e| {
            error!("[qc-18] Error starting db transaction: {}", e);
            e
        })?;
        tx.persist_epoch_data(record).map_err(|e| {
            error!("[qc-18] Error persisting epoch {} data: {}", epoch, e);
            e
        })?;
        if !self.synchronizer.is_running() {
            tx.set_sync_state(&self.config.sync_state_key, SyncState { epoch })
                .map_err(|e| {
                    error!("[qc-18] Error updating sync state: {}", e);
                    e
                })?;
        }
        tx.commit().await.map_err(|e| {
            error!("[qc-18] Error committing epoch {} transaction: {}", epoch, e);
            e
        })?;

        for block in &epoch_blocks {
            self.remove_cached_block(block);
        }
        self.set_processed_epoch(epoch as i64);
        metrics::record_epoch_finalized(epoch);
        debug!(
            "[qc-18] Finalized epoch {}: {} canonical blocks persisted",
            epoch,
            epoch_blocks.len()
        );
        Ok(())
    }
}
