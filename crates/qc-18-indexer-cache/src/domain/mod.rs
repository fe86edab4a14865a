//! Domain module for the Indexer Cache
//!
//! ## Modules
//! - block: cached blocks and their headers
//! - chain: slot/epoch arithmetic
//! - epoch_stats: per-fork epoch duty and validator snapshots
//! - records: storage rows
//! - validators: validator set snapshots
//! - votes: aggregated vote tallies

pub mod block;
pub mod chain;
pub mod epoch_stats;
pub mod records;
pub mod validators;
pub mod votes;

pub use block::{
    format_opt_root, format_root, BeaconBlockHeader, CachedBlock, Root, SignedBlockHeader,
};
pub use chain::{ChainSpec, DEFAULT_SLOTS_PER_EPOCH};
pub use epoch_stats::{EpochDuties, EpochStats, ValidatorStats};
pub use records::{
    BlockOrphanedRef, BlockRecord, EpochRecord, OrphanedBlockRecord, SyncState,
    UnfinalizedBlockHeader, UnfinalizedDutyRef,
};
pub use validators::{Validator, ValidatorSet, FAR_FUTURE_EPOCH};
pub use votes::{EpochVotes, VoteTally};
