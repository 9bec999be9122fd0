//! Round-robin entry placement.
//!
//! Entry `e` is written to `write_quorum` consecutive ensemble positions
//! starting at `e % ensemble_size`, wrapping at the end. Readers walk the
//! same window in the same order, so load spreads across the ensemble while
//! replica selection stays deterministic.

use crate::ledger::types::{DistributionSchedule, EntryId};

#[derive(Clone, Copy, Debug)]
pub struct RoundRobinSchedule {
    ensemble_size: usize,
    write_quorum: usize,
}

impl RoundRobinSchedule {
    pub fn new(ensemble_size: usize, write_quorum: usize) -> Self {
        Self {
            ensemble_size: ensemble_size.max(1),
            write_quorum: write_quorum.clamp(1, ensemble_size.max(1)),
        }
    }
}

impl DistributionSchedule for RoundRobinSchedule {
    fn write_set(&self, entry: EntryId) -> Vec<usize> {
        let base = (entry % self.ensemble_size as u64) as usize;
        (0..self.write_quorum)
            .map(|i| (base + i) % self.ensemble_size)
            .collect()
    }
}
