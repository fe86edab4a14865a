//! Epoch statistics entity
//!
//! Duty and validator-set snapshot for one epoch as seen from one fork.
//! Duties depend on the post-state of the dependent root, so competing forks
//! can carry different stats for the same epoch number.

use crate::domain::block::Root;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Proposer assignments for the slots of an epoch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EpochDuties {
    /// slot -> proposer validator index
    pub proposers: BTreeMap<u64, u64>,
}

/// Validator-set summary for an epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ValidatorStats {
    pub validator_count: u64,
    /// Eligible stake in gwei
    pub eligible_amount: u64,
}

#[derive(Debug, Default)]
struct DutiesPayload {
    duties: Option<EpochDuties>,
    in_db: bool,
}

/// Epoch stats held in the cache.
///
/// Duties and validator data are filled independently by different loaders,
/// hence the two locks.
#[derive(Debug)]
pub struct EpochStats {
    pub epoch: u64,
    pub dependent_root: Option<Root>,
    duties: RwLock<DutiesPayload>,
    validators: RwLock<Option<ValidatorStats>>,
}

impl EpochStats {
    pub fn new(epoch: u64, dependent_root: Option<Root>) -> Self {
        Self {
            epoch,
            dependent_root,
            duties: RwLock::new(DutiesPayload::default()),
            validators: RwLock::new(None),
        }
    }

    pub fn duties(&self) -> Option<EpochDuties> {
        self.duties.read().duties.clone()
    }

    pub fn set_duties(&self, duties: EpochDuties) {
        self.duties.write().duties = Some(duties);
    }

    /// Proposer assigned to `slot`, if duties are loaded.
    pub fn proposer_of(&self, slot: u64) -> Option<u64> {
        self.duties
            .read()
            .duties
            .as_ref()
            .and_then(|d| d.proposers.get(&slot).copied())
    }

    pub fn duties_in_db(&self) -> bool {
        self.duties.read().in_db
    }

    pub fn set_duties_in_db(&self, in_db: bool) {
        self.duties.write().in_db = in_db;
    }

    pub fn validator_stats(&self) -> Option<ValidatorStats> {
        *self.validators.read()
    }

    pub fn set_validator_stats(&self, stats: ValidatorStats) {
        *self.validators.write() = Some(stats);
    }
}
