//! Mock vote aggregator and synchronizer

use crate::domain::{EpochStats, EpochVotes, Root};
use crate::ports::outbound::{CanonicalBlockMap, Synchronizer, VoteAggregator};
use parking_lot::RwLock;
use tracing::debug;

/// One recorded `aggregate_epoch_votes` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregationCall {
    pub epoch: u64,
    /// Slots of the canonical map handed to the aggregator
    pub slots: Vec<u64>,
    pub target_root: Option<Root>,
}

/// Aggregator returning a fixed tally and recording its inputs.
#[derive(Default)]
pub struct MockVoteAggregator {
    votes: RwLock<EpochVotes>,
    calls: RwLock<Vec<AggregationCall>>,
}

impl MockVoteAggregator {
    pub fn new(votes: EpochVotes) -> Self {
        Self {
            votes: RwLock::new(votes),
            calls: RwLock::default(),
        }
    }

    pub fn set_votes(&self, votes: EpochVotes) {
        *self.votes.write() = votes;
    }

    /// Epochs aggregated so far, in call order
    pub fn calls(&self) -> Vec<u64> {
        self.calls.read().iter().map(|call| call.epoch).collect()
    }

    pub fn call_for(&self, epoch: u64) -> Option<AggregationCall> {
        self.calls
            .read()
            .iter()
            .find(|call| call.epoch == epoch)
            .cloned()
    }
}

impl VoteAggregator for MockVoteAggregator {
    fn aggregate_epoch_votes(
        &self,
        canonical_blocks: &CanonicalBlockMap,
        epoch: u64,
        _epoch_stats: &EpochStats,
        target_root: Option<Root>,
    ) -> EpochVotes {
        self.calls.write().push(AggregationCall {
            epoch,
            slots: canonical_blocks.keys().copied().collect(),
            target_root,
        });
        *self.votes.read()
    }
}

#[derive(Default)]
struct SyncProgress {
    running: bool,
    current_epoch: u64,
    started_from: Vec<u64>,
}

/// Synchronizer that only records start requests.
#[derive(Default)]
pub struct MockSynchronizer {
    progress: RwLock<SyncProgress>,
}

impl MockSynchronizer {
    /// Start epochs passed to `start_sync`, in call order
    pub fn started_from(&self) -> Vec<u64> {
        self.progress.read().started_from.clone()
    }

    pub fn set_running(&self, running: bool) {
        self.progress.write().running = running;
    }
}

impl Synchronizer for MockSynchronizer {
    fn start_sync(&self, from_epoch: u64) {
        debug!("[qc-18] Mock synchronizer started at epoch {}", from_epoch);
        let mut progress = self.progress.write();
        progress.running = true;
        progress.current_epoch = from_epoch;
        progress.started_from.push(from_epoch);
    }

    fn is_epoch_ahead(&self, epoch: u64) -> bool {
        let progress = self.progress.read();
        progress.running && progress.current_epoch >= epoch
    }

    fn is_running(&self) -> bool {
        self.progress.read().running
    }
}
