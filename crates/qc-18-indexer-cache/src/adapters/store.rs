//! In-memory indexer store
//!
//! Implements `IndexerStore` without a database. Writes are buffered per
//! transaction and applied on commit, so a failed or dropped transaction
//! leaves nothing behind. Used by the test suites and by read-only setups.

use crate::config::SYNC_STATE_KEY;
use crate::domain::{
    BlockOrphanedRef, BlockRecord, EpochRecord, OrphanedBlockRecord, Root, SyncState,
    UnfinalizedBlockHeader, UnfinalizedDutyRef,
};
use crate::error::{IndexerError, IndexerResult};
use crate::ports::outbound::{IndexerStore, StoreTransaction};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
struct StoreData {
    unfinalized_headers: Vec<UnfinalizedBlockHeader>,
    duty_refs: Vec<UnfinalizedDutyRef>,
    sync_states: HashMap<String, SyncState>,
    blocks: HashMap<Root, BlockRecord>,
    /// Status of roots stored outside this process
    external_refs: HashMap<Root, bool>,
    orphan_records: Vec<OrphanedBlockRecord>,
    /// Every persisted epoch, in commit order
    epoch_log: Vec<EpochRecord>,
}

#[derive(Default)]
struct FailurePlan {
    begin: AtomicBool,
    commit: AtomicBool,
}

/// In-memory `IndexerStore`.
#[derive(Default)]
pub struct InMemoryIndexerStore {
    data: Arc<RwLock<StoreData>>,
    failures: Arc<FailurePlan>,
    commits: Arc<AtomicUsize>,
}

impl InMemoryIndexerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with unfinalized rows from a previous run.
    pub fn with_unfinalized(
        headers: Vec<UnfinalizedBlockHeader>,
        duty_refs: Vec<UnfinalizedDutyRef>,
    ) -> Self {
        let store = Self::default();
        {
            let mut data = store.data.write();
            data.unfinalized_headers = headers;
            data.duty_refs = duty_refs;
        }
        store
    }

    pub fn put_sync_state(&self, key: &str, epoch: u64) {
        self.data
            .write()
            .sync_states
            .insert(key.to_string(), SyncState { epoch });
    }

    /// Watermark under the default sync state key
    pub fn sync_state_epoch(&self) -> Option<u64> {
        self.data
            .read()
            .sync_states
            .get(SYNC_STATE_KEY)
            .map(|state| state.epoch)
    }

    /// Register a root as already stored, e.g. by the synchronizer.
    pub fn put_orphaned_ref(&self, block_ref: BlockOrphanedRef) {
        self.data
            .write()
            .external_refs
            .insert(block_ref.root, block_ref.orphaned);
    }

    /// Make the next `begin` fail.
    pub fn fail_next_begin(&self) {
        self.failures.begin.store(true, Ordering::SeqCst);
    }

    /// Make the next `commit` fail; its writes are discarded.
    pub fn fail_next_commit(&self) {
        self.failures.commit.store(true, Ordering::SeqCst);
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Epoch numbers in the order they were persisted, duplicates included
    pub fn persisted_epochs(&self) -> Vec<u64> {
        self.data.read().epoch_log.iter().map(|r| r.epoch).collect()
    }

    pub fn epoch_record(&self, epoch: u64) -> Option<EpochRecord> {
        self.data
            .read()
            .epoch_log
            .iter()
            .rev()
            .find(|r| r.epoch == epoch)
            .cloned()
    }

    pub fn block_record(&self, root: &Root) -> Option<BlockRecord> {
        self.data.read().blocks.get(root).cloned()
    }

    pub fn orphan_record(&self, root: &Root) -> Option<OrphanedBlockRecord> {
        self.data
            .read()
            .orphan_records
            .iter()
            .find(|r| &r.root == root)
            .cloned()
    }

    /// Roots archived as orphaned, in commit order
    pub fn orphaned_roots(&self) -> Vec<Root> {
        self.data.read().orphan_records.iter().map(|r| r.root).collect()
    }
}

#[async_trait]
impl IndexerStore for InMemoryIndexerStore {
    type Transaction = InMemoryTransaction;

    async fn load_unfinalized_block_headers(&self) -> IndexerResult<Vec<UnfinalizedBlockHeader>> {
        Ok(self.data.read().unfinalized_headers.clone())
    }

    async fn load_unfinalized_epoch_duty_refs(&self) -> IndexerResult<Vec<UnfinalizedDutyRef>> {
        Ok(self.data.read().duty_refs.clone())
    }

    async fn get_sync_state(&self, key: &str) -> IndexerResult<Option<SyncState>> {
        Ok(self.data.read().sync_states.get(key).copied())
    }

    async fn get_block_orphaned_refs(
        &self,
        roots: &[Root],
    ) -> IndexerResult<Vec<BlockOrphanedRef>> {
        let data = self.data.read();
        let refs = roots
            .iter()
            .filter_map(|root| {
                let orphaned = data
                    .blocks
                    .get(root)
                    .map(|block| block.orphaned)
                    .or_else(|| data.external_refs.get(root).copied())?;
                Some(BlockOrphanedRef {
                    root: *root,
                    orphaned,
                })
            })
            .collect();
        Ok(refs)
    }

    async fn begin(&self) -> IndexerResult<InMemoryTransaction> {
        if self.failures.begin.swap(false, Ordering::SeqCst) {
            return Err(IndexerError::TransactionBegin {
                reason: "injected begin failure".to_string(),
            });
        }
        Ok(InMemoryTransaction {
            data: Arc::clone(&self.data),
            failures: Arc::clone(&self.failures),
            commits: Arc::clone(&self.commits),
            writes: Vec::new(),
        })
    }
}

enum PendingWrite {
    Block(BlockRecord),
    OrphanRecord(OrphanedBlockRecord),
    Epoch(EpochRecord),
    SyncState(String, SyncState),
}

/// Buffered writes of one `InMemoryIndexerStore` transaction.
pub struct InMemoryTransaction {
    data: Arc<RwLock<StoreData>>,
    failures: Arc<FailurePlan>,
    commits: Arc<AtomicUsize>,
    writes: Vec<PendingWrite>,
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    fn insert_block(&mut self, block: BlockRecord) -> IndexerResult<()> {
        self.writes.push(PendingWrite::Block(block));
        Ok(())
    }

    fn insert_orphaned_block(&mut self, record: OrphanedBlockRecord) -> IndexerResult<()> {
        self.writes.push(PendingWrite::OrphanRecord(record));
        Ok(())
    }

    fn persist_epoch_data(&mut self, record: EpochRecord) -> IndexerResult<()> {
        self.writes.push(PendingWrite::Epoch(record));
        Ok(())
    }

    fn set_sync_state(&mut self, key: &str, state: SyncState) -> IndexerResult<()> {
        self.writes
            .push(PendingWrite::SyncState(key.to_string(), state));
        Ok(())
    }

    async fn commit(self) -> IndexerResult<()> {
        if self.failures.commit.swap(false, Ordering::SeqCst) {
            return Err(IndexerError::TransactionCommit {
                reason: "injected commit failure".to_string(),
            });
        }

        let write_count = self.writes.len();
        let mut data = self.data.write();
        for write in self.writes {
            match write {
                PendingWrite::Block(block) => {
                    data.blocks.insert(block.root, block);
                }
                PendingWrite::OrphanRecord(record) => data.orphan_records.push(record),
                PendingWrite::Epoch(record) => {
                    for block in &record.blocks {
                        data.blocks.insert(block.root, block.clone());
                    }
                    data.epoch_log.push(record);
                }
                PendingWrite::SyncState(key, state) => {
                    data.sync_states.insert(key, state);
                }
            }
        }
        drop(data);

        self.commits.fetch_add(1, Ordering::SeqCst);
        debug!("[qc-18] In-memory store committed {} writes", write_count);
        Ok(())
    }
}
