//! Slot and epoch arithmetic.

/// Slots per epoch on mainnet-like chains.
pub const DEFAULT_SLOTS_PER_EPOCH: u64 = 32;

/// Chain parameters the cache needs to bucket slots into epochs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainSpec {
    pub slots_per_epoch: u64,
}

impl ChainSpec {
    pub fn new(slots_per_epoch: u64) -> Self {
        // A zero-length epoch would make every division below panic.
        Self {
            slots_per_epoch: slots_per_epoch.max(1),
        }
    }

    /// Epoch containing `slot`.
    pub fn epoch_of_slot(&self, slot: u64) -> u64 {
        slot / self.slots_per_epoch
    }

    /// First slot of `epoch`.
    pub fn epoch_start_slot(&self, epoch: u64) -> u64 {
        epoch.saturating_mul(self.slots_per_epoch)
    }
}

impl Default for ChainSpec {
    fn default() -> Self {
        Self::new(DEFAULT_SLOTS_PER_EPOCH)
    }
}
