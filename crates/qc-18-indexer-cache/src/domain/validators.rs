//! Validator set snapshot
//!
//! The chain client's validator list is expensive to fetch; the cache keeps
//! the most recent one around and derives per-epoch summaries from it.

use crate::domain::epoch_stats::ValidatorStats;

/// Far-future epoch marker used by the beacon chain for "not yet".
pub const FAR_FUTURE_EPOCH: u64 = u64::MAX;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validator {
    pub index: u64,
    /// Effective balance in gwei
    pub effective_balance: u64,
    pub activation_epoch: u64,
    pub exit_epoch: u64,
}

impl Validator {
    pub fn is_active_at(&self, epoch: u64) -> bool {
        self.activation_epoch <= epoch && epoch < self.exit_epoch
    }
}

/// Validator list as of a given epoch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidatorSet {
    pub epoch: u64,
    pub validators: Vec<Validator>,
}

impl ValidatorSet {
    pub fn new(epoch: u64, validators: Vec<Validator>) -> Self {
        Self { epoch, validators }
    }

    /// Active validator count and their summed effective balance at `epoch`.
    pub fn stats_at(&self, epoch: u64) -> ValidatorStats {
        self.validators
            .iter()
            .filter(|v| v.is_active_at(epoch))
            .fold(ValidatorStats::default(), |mut acc, v| {
                acc.validator_count += 1;
                acc.eligible_amount = acc.eligible_amount.saturating_add(v.effective_balance);
                acc
            })
    }
}
