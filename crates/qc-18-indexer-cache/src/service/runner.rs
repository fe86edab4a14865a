//! Cache loop
//!
//! One background task per cache. It wakes on a finalized-head notification
//! or after `idle_poll_interval`, runs a full pass, and backs off for
//! `retry_delay` when the pass fails.

use super::IndexerCache;
use crate::error::{IndexerError, IndexerResult};
use crate::metrics;
use crate::ports::outbound::{IndexerStore, Synchronizer, VoteAggregator};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

impl<S, A, Y> IndexerCache<S, A, Y>
where
    S: IndexerStore + 'static,
    A: VoteAggregator + 'static,
    Y: Synchronizer + 'static,
{
    /// Spawn the cache loop. Fails if it is already running.
    pub fn start(self: &Arc<Self>) -> IndexerResult<JoinHandle<()>> {
        let trigger_rx = self
            .trigger_rx
            .lock()
            .take()
            .ok_or(IndexerError::LoopAlreadyStarted)?;
        let cache = Arc::clone(self);
        info!("[qc-18] Starting indexer cache loop");
        Ok(tokio::spawn(async move {
            cache.run_cache_loop(trigger_rx).await;
        }))
    }
}

impl<S, A, Y> IndexerCache<S, A, Y>
where
    S: IndexerStore,
    A: VoteAggregator,
    Y: Synchronizer,
{
    async fn run_cache_loop(&self, mut trigger_rx: mpsc::Receiver<()>) {
        loop {
            tokio::select! {
                _ = trigger_rx.recv() => {}
                _ = tokio::time::sleep(self.config.idle_poll_interval) => {}
            }

            debug!("[qc-18] Run indexer cache logic");
            if let Err(e) = self.run_cache_logic().await {
                error!(
                    "[qc-18] Indexer cache error: {}, retrying in {:?}",
                    e, self.config.retry_delay
                );
                metrics::record_cache_loop_error();
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }
    }

    /// Run one pass: finalization catch-up, orphan sweep, persistence hook,
    /// cleanup. Passes never overlap; the first error aborts the pass.
    pub async fn run_cache_logic(&self) -> IndexerResult<()> {
        let _pass = self.pass.lock().await;
        let highest_slot = self.state.read().highest_slot;
        if highest_slot < 0 {
            return Ok(());
        }

        let ceiling = if self.config.write_db {
            self.load_processed_epoch().await?;
            self.process_finalized_epochs().await?;

            let (processed, lowest_slot, persisted) = {
                let state = self.state.read();
                (state.processed_epoch, state.lowest_slot, state.persist_epoch)
            };
            if lowest_slot >= 0 && self.epoch_of_slot(lowest_slot as u64) as i64 <= processed {
                self.process_orphaned_blocks(processed).await?;
            }
            if persisted < processed {
                self.process_cache_persistence().await?;
                self.state.write().persist_epoch = processed;
            }
            processed
        } else {
            self.state.read().finalized_epoch
        };

        if self.cleanup_epoch() < ceiling {
            self.process_cache_cleanup(ceiling)?;
            self.state.write().cleanup_epoch = ceiling;
        }
        Ok(())
    }
}
