//! Storage rows exchanged with the indexer store.
//!
//! The cache never talks SQL; it hands these flattened records to the store
//! inside a transaction it controls.

use crate::domain::block::{CachedBlock, Root, SignedBlockHeader};
use crate::domain::epoch_stats::{EpochStats, ValidatorStats};
use crate::domain::votes::EpochVotes;
use crate::error::{IndexerError, IndexerResult};
use serde::{Deserialize, Serialize};

/// Persisted indexer progress.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub epoch: u64,
}

/// A block row (canonical or orphaned).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockRecord {
    pub root: Root,
    pub slot: u64,
    pub epoch: u64,
    pub parent_root: Option<Root>,
    pub state_root: Option<Root>,
    pub proposer: Option<u64>,
    /// Proposer the epoch duties expected for this slot
    pub expected_proposer: Option<u64>,
    pub orphaned: bool,
}

impl BlockRecord {
    pub fn build(block: &CachedBlock, epoch: u64, epoch_stats: Option<&EpochStats>) -> Self {
        let header = block.header();
        Self {
            root: block.root,
            slot: block.slot,
            epoch,
            parent_root: header.as_ref().map(|h| h.message.parent_root),
            state_root: header.as_ref().map(|h| h.message.state_root),
            proposer: header.as_ref().map(|h| h.message.proposer_index),
            expected_proposer: epoch_stats.and_then(|s| s.proposer_of(block.slot)),
            orphaned: false,
        }
    }
}

/// Archive entry for an orphaned block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrphanedBlockRecord {
    pub root: Root,
    /// JSON-encoded `SignedBlockHeader`, empty when the header never arrived
    pub header: String,
}

impl OrphanedBlockRecord {
    pub fn build(block: &CachedBlock) -> IndexerResult<Self> {
        let header = match block.header() {
            Some(header) => encode_header(&header)?,
            None => String::new(),
        };
        Ok(Self {
            root: block.root,
            header,
        })
    }
}

/// Everything persisted when an epoch is finalized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EpochRecord {
    pub epoch: u64,
    pub target_root: Option<Root>,
    pub dependent_root: Option<Root>,
    /// Canonical blocks of the epoch in slot order
    pub blocks: Vec<BlockRecord>,
    pub validator_stats: Option<ValidatorStats>,
    pub votes: EpochVotes,
}

/// Unfinalized header row restored at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnfinalizedBlockHeader {
    pub root: Root,
    pub slot: u64,
    pub header: String,
}

impl UnfinalizedBlockHeader {
    pub fn new(root: Root, slot: u64, header: &SignedBlockHeader) -> IndexerResult<Self> {
        Ok(Self {
            root,
            slot,
            header: encode_header(header)?,
        })
    }

    pub fn decode(&self) -> IndexerResult<SignedBlockHeader> {
        decode_header(&self.header)
    }
}

/// Reference to stored duties of an unfinalized epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnfinalizedDutyRef {
    pub epoch: u64,
    pub dependent_root: Root,
}

/// Known storage status of a block root.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockOrphanedRef {
    pub root: Root,
    pub orphaned: bool,
}

pub fn encode_header(header: &SignedBlockHeader) -> IndexerResult<String> {
    serde_json::to_string(header).map_err(IndexerError::from)
}

pub fn decode_header(raw: &str) -> IndexerResult<SignedBlockHeader> {
    serde_json::from_str(raw).map_err(IndexerError::from)
}
