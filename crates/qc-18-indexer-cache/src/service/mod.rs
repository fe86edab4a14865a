//! Indexer Cache Service
//!
//! Owns the unfinalized block tree and the epoch-stats map, and runs the
//! finalization pipeline over them:
//!
//! ```text
//! head following ──blocks/stats──→ IndexerCache ──set_finalized_head──→ cache loop
//!                                                                          │
//!             ┌────────────────────────────────────────────────────────────┘
//!             ├── finalizer: persist epochs processed+1 ..= finalized
//!             ├── orphans:   archive leftovers at or below processed
//!             ├── cleanup:   persistence hook, then evict at or below ceiling
//!             └── (on error) log, back off, retry next pass
//! ```
//!
//! ## Locking
//!
//! - `state`: slot/root maps, slot bounds, watermarks, finalized checkpoint.
//!   Never held across storage I/O.
//! - `epoch_stats`: independent map lock so duty loading and block ingestion
//!   do not contend.
//! - Each `CachedBlock`/`EpochStats` locks its own payload.
//! - `pass`: serializes cache passes; only one runs at a time.
//!
//! One instance per process. It is constructed explicitly and handed to the
//! collaborators that feed it.

mod cleanup;
mod finalizer;
mod orphans;
mod resolver;
mod runner;

use crate::config::IndexerCacheConfig;
use crate::domain::{format_root, CachedBlock, ChainSpec, EpochStats, Root, ValidatorSet};
use crate::error::{IndexerError, IndexerResult};
use crate::metrics;
use crate::ports::inbound::IndexerCacheApi;
use crate::ports::outbound::{CanonicalBlockMap, IndexerStore, Synchronizer, VoteAggregator};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore, SemaphorePermit};
use tracing::{debug, info, warn};

/// `processed_epoch` before the sync watermark has been loaded.
pub const EPOCH_UNKNOWN: i64 = -2;

/// Watermark / slot bound value meaning "none yet".
pub const NO_EPOCH: i64 = -1;

/// Shared cache state behind the top-level lock.
struct CacheState {
    slot_map: HashMap<u64, Vec<Arc<CachedBlock>>>,
    root_map: HashMap<Root, Arc<CachedBlock>>,
    highest_slot: i64,
    lowest_slot: i64,
    finalized_epoch: i64,
    finalized_root: Option<Root>,
    processed_epoch: i64,
    persist_epoch: i64,
    cleanup_epoch: i64,
    /// Epochs at or below were handed to the synchronizer at startup
    sync_handoff_epoch: i64,
    last_validators: Option<Arc<ValidatorSet>>,
}

impl CacheState {
    fn new() -> Self {
        Self {
            slot_map: HashMap::new(),
            root_map: HashMap::new(),
            highest_slot: NO_EPOCH,
            lowest_slot: NO_EPOCH,
            finalized_epoch: NO_EPOCH,
            finalized_root: None,
            processed_epoch: EPOCH_UNKNOWN,
            persist_epoch: NO_EPOCH,
            cleanup_epoch: NO_EPOCH,
            sync_handoff_epoch: NO_EPOCH,
            last_validators: None,
        }
    }

    fn recompute_slot_bounds(&mut self) {
        self.highest_slot = self.slot_map.keys().max().map_or(NO_EPOCH, |s| *s as i64);
        self.lowest_slot = self.slot_map.keys().min().map_or(NO_EPOCH, |s| *s as i64);
    }
}

/// Indexer Cache
pub struct IndexerCache<S, A, Y>
where
    S: IndexerStore,
    A: VoteAggregator,
    Y: Synchronizer,
{
    config: IndexerCacheConfig,
    chain: ChainSpec,
    store: Arc<S>,
    aggregator: Arc<A>,
    synchronizer: Arc<Y>,
    state: RwLock<CacheState>,
    epoch_stats: RwLock<HashMap<u64, Vec<Arc<EpochStats>>>>,
    validator_loading: Semaphore,
    trigger_tx: mpsc::Sender<()>,
    trigger_rx: Mutex<Option<mpsc::Receiver<()>>>,
    pass: tokio::sync::Mutex<()>,
}

impl<S, A, Y> IndexerCache<S, A, Y>
where
    S: IndexerStore,
    A: VoteAggregator,
    Y: Synchronizer,
{
    /// Create the cache and repopulate it from the unfinalized data left in
    /// storage by a previous run. The cache loop is not started; see
    /// [`IndexerCache::start`].
    pub async fn new(
        config: IndexerCacheConfig,
        store: Arc<S>,
        aggregator: Arc<A>,
        synchronizer: Arc<Y>,
    ) -> Arc<Self> {
        let (trigger_tx, trigger_rx) = mpsc::channel(config.trigger_capacity.max(1));
        let cache = Arc::new(Self {
            chain: config.chain_spec(),
            validator_loading: Semaphore::new(config.validator_loading_limit.max(1)),
            config,
            store,
            aggregator,
            synchronizer,
            state: RwLock::new(CacheState::new()),
            epoch_stats: RwLock::new(HashMap::new()),
            trigger_tx,
            trigger_rx: Mutex::new(Some(trigger_rx)),
            pass: tokio::sync::Mutex::new(()),
        });

        if let Err(e) = cache.restore_unfinalized_cache().await {
            warn!("[qc-18] Could not restore unfinalized cache from storage: {}", e);
        }
        cache
    }

    async fn restore_unfinalized_cache(&self) -> IndexerResult<()> {
        let headers = self.store.load_unfinalized_block_headers().await?;
        let mut restored_blocks = 0usize;
        for row in headers {
            let header = match row.decode() {
                Ok(header) => header,
                Err(e) => {
                    warn!("[qc-18] Error parsing unfinalized block header from db: {}", e);
                    continue;
                }
            };
            debug!("[qc-18] Restored unfinalized block header from db: {}", row.slot);
            let (block, _) = self.create_or_get_cached_block(row.root, row.slot);
            block.restore(header);
            restored_blocks += 1;
        }

        let duty_refs = self.store.load_unfinalized_epoch_duty_refs().await?;
        let restored_duties = duty_refs.len();
        for duty_ref in duty_refs {
            debug!(
                "[qc-18] Restored unfinalized duty ref from db: {}/{}",
                duty_ref.epoch,
                format_root(&duty_ref.dependent_root)
            );
            let (stats, _) =
                self.create_or_get_epoch_stats(duty_ref.epoch, Some(duty_ref.dependent_root));
            stats.set_duties_in_db(true);
        }

        info!(
            "[qc-18] Restored {} unfinalized blocks and {} duty refs",
            restored_blocks, restored_duties
        );
        Ok(())
    }

    pub fn config(&self) -> &IndexerCacheConfig {
        &self.config
    }

    pub fn chain_spec(&self) -> ChainSpec {
        self.chain
    }

    pub fn processed_epoch(&self) -> i64 {
        self.state.read().processed_epoch
    }

    pub fn persist_epoch(&self) -> i64 {
        self.state.read().persist_epoch
    }

    pub fn cleanup_epoch(&self) -> i64 {
        self.state.read().cleanup_epoch
    }

    /// `(lowest, highest)` cached slot, `-1` when empty
    pub fn slot_bounds(&self) -> (i64, i64) {
        let state = self.state.read();
        (state.lowest_slot, state.highest_slot)
    }

    pub fn cached_block_count(&self) -> usize {
        self.state.read().root_map.len()
    }

    pub fn epoch_stats_count(&self) -> usize {
        self.epoch_stats.read().values().map(Vec::len).sum()
    }

    /// Keep the validator set of the highest epoch seen.
    pub fn set_last_validators(&self, validators: ValidatorSet) {
        let mut state = self.state.write();
        let newer = state
            .last_validators
            .as_ref()
            .map_or(true, |current| validators.epoch > current.epoch);
        if newer {
            state.last_validators = Some(Arc::new(validators));
        }
    }

    pub fn get_last_validators(&self) -> Option<Arc<ValidatorSet>> {
        self.state.read().last_validators.clone()
    }

    /// Wait for a validator-set loading slot. At most
    /// `validator_loading_limit` loads run at once.
    pub async fn acquire_validator_loading_permit(&self) -> IndexerResult<SemaphorePermit<'_>> {
        self.validator_loading
            .acquire()
            .await
            .map_err(|_| IndexerError::ValidatorLoadingClosed)
    }

    /// Kick off historical backfill unless a running sync already covers
    /// `start_epoch`.
    pub fn start_synchronizer(&self, start_epoch: u64) {
        if self.synchronizer.is_epoch_ahead(start_epoch) {
            debug!("[qc-18] Synchronizer already covers epoch {}", start_epoch);
            return;
        }
        info!("[qc-18] Starting synchronizer from epoch {}", start_epoch);
        self.synchronizer.start_sync(start_epoch);
    }

    fn set_processed_epoch(&self, epoch: i64) {
        self.state.write().processed_epoch = epoch;
        metrics::set_processed_epoch(epoch);
    }

    fn epoch_of_slot(&self, slot: u64) -> u64 {
        self.chain.epoch_of_slot(slot)
    }
}

impl<S, A, Y> IndexerCacheApi for IndexerCache<S, A, Y>
where
    S: IndexerStore,
    A: VoteAggregator,
    Y: Synchronizer,
{
    fn set_finalized_head(&self, epoch: i64, root: Root) {
        let mut state = self.state.write();
        if epoch <= state.finalized_epoch {
            return;
        }
        state.finalized_epoch = epoch;
        state.finalized_root = Some(root);
        drop(state);

        debug!("[qc-18] Finalized head: epoch {} root {}", epoch, format_root(&root));
        metrics::set_finalized_epoch(epoch);

        // A full channel already holds a pending wakeup.
        let _ = self.trigger_tx.try_send(());
    }

    fn get_finalized_head(&self) -> (i64, Option<Root>) {
        let state = self.state.read();
        (state.finalized_epoch, state.finalized_root)
    }

    fn create_or_get_cached_block(&self, root: Root, slot: u64) -> (Arc<CachedBlock>, bool) {
        let mut state = self.state.write();
        if let Some(block) = state.root_map.get(&root) {
            return (Arc::clone(block), false);
        }

        let block = Arc::new(CachedBlock::new(root, slot));
        state.root_map.insert(root, Arc::clone(&block));
        state
            .slot_map
            .entry(slot)
            .or_default()
            .push(Arc::clone(&block));

        let slot = slot as i64;
        if slot > state.highest_slot {
            state.highest_slot = slot;
        }
        if state.lowest_slot < 0 || slot < state.lowest_slot {
            state.lowest_slot = slot;
        }
        metrics::set_cached_blocks(state.root_map.len());
        (block, true)
    }

    fn get_cached_block(&self, root: &Root) -> Option<Arc<CachedBlock>> {
        self.state.read().root_map.get(root).cloned()
    }

    fn get_cached_blocks_by_slot(&self, slot: u64) -> Vec<Arc<CachedBlock>> {
        self.state
            .read()
            .slot_map
            .get(&slot)
            .cloned()
            .unwrap_or_default()
    }

    fn remove_cached_block(&self, block: &CachedBlock) {
        let mut state = self.state.write();
        if state.root_map.remove(&block.root).is_none() {
            return;
        }

        let mut bucket_emptied = false;
        if let Some(bucket) = state.slot_map.get_mut(&block.slot) {
            bucket.retain(|b| b.root != block.root);
            bucket_emptied = bucket.is_empty();
        }
        if bucket_emptied {
            state.slot_map.remove(&block.slot);
            let slot = block.slot as i64;
            if slot == state.lowest_slot || slot == state.highest_slot {
                state.recompute_slot_bounds();
            }
        }
        metrics::set_cached_blocks(state.root_map.len());
    }

    fn create_or_get_epoch_stats(
        &self,
        epoch: u64,
        dependent_root: Option<Root>,
    ) -> (Arc<EpochStats>, bool) {
        let mut map = self.epoch_stats.write();
        let entries = map.entry(epoch).or_default();
        if let Some(stats) = entries
            .iter()
            .find(|s| s.dependent_root == dependent_root)
        {
            return (Arc::clone(stats), false);
        }

        let stats = Arc::new(EpochStats::new(epoch, dependent_root));
        entries.push(Arc::clone(&stats));
        (stats, true)
    }

    fn get_epoch_stats(
        &self,
        epoch: u64,
        dependent_root: Option<&Root>,
    ) -> Option<Arc<EpochStats>> {
        let map = self.epoch_stats.read();
        let entries = map.get(&epoch)?;
        match dependent_root {
            Some(root) => entries
                .iter()
                .find(|s| s.dependent_root.as_ref() == Some(root))
                .cloned(),
            None => entries.first().cloned(),
        }
    }

    fn remove_epoch_stats(&self, stats: &EpochStats) {
        let mut map = self.epoch_stats.write();
        let mut emptied = false;
        if let Some(entries) = map.get_mut(&stats.epoch) {
            entries.retain(|s| s.dependent_root != stats.dependent_root);
            emptied = entries.is_empty();
        }
        if emptied {
            map.remove(&stats.epoch);
        }
    }

    fn get_canonical_block_map(&self, epoch: u64, head: Option<Root>) -> CanonicalBlockMap {
        self.canonical_block_map(epoch, head)
    }
}
