//! Vote aggregation result
//!
//! Produced by the vote aggregator, consumed by the finalization driver.

/// Stake-weighted vote tallies (gwei).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VoteTally {
    pub target_vote_amount: u64,
    pub head_vote_amount: u64,
    pub total_vote_amount: u64,
}

/// Votes for one epoch, split by the epoch the attestation was included in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EpochVotes {
    /// Votes included in blocks of the epoch itself
    pub current_epoch: VoteTally,
    /// Votes included in the following epoch that still target this one
    pub next_epoch: VoteTally,
}

impl EpochVotes {
    pub fn target_total(&self) -> u64 {
        self.current_epoch
            .target_vote_amount
            .saturating_add(self.next_epoch.target_vote_amount)
    }

    pub fn head_total(&self) -> u64 {
        self.current_epoch
            .head_vote_amount
            .saturating_add(self.next_epoch.head_vote_amount)
    }

    pub fn vote_total(&self) -> u64 {
        self.current_epoch
            .total_vote_amount
            .saturating_add(self.next_epoch.total_vote_amount)
    }
}
