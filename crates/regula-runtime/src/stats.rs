//! Runtime statistics

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time copy of the engine counters
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeStats {
    pub branches_created: u64,
    pub transitions: u64,
    pub records_accepted: u64,
    pub records_rejected: u64,
    pub recomputations: u64,
    pub horizons_rebuilt: u64,
    pub ambiguity_aborts: u64,
    pub trials: u64,
}

/// Live counters, updated without locking
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub branches_created: AtomicU64,
    pub transitions: AtomicU64,
    pub records_accepted: AtomicU64,
    pub records_rejected: AtomicU64,
    pub recomputations: AtomicU64,
    pub horizons_rebuilt: AtomicU64,
    pub ambiguity_aborts: AtomicU64,
    pub trials: AtomicU64,
}

impl StatsCounters {
    #[inline]
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RuntimeStats {
        RuntimeStats {
            branches_created: self.branches_created.load(Ordering::Relaxed),
            transitions: self.transitions.load(Ordering::Relaxed),
            records_accepted: self.records_accepted.load(Ordering::Relaxed),
            records_rejected: self.records_rejected.load(Ordering::Relaxed),
            recomputations: self.recomputations.load(Ordering::Relaxed),
            horizons_rebuilt: self.horizons_rebuilt.load(Ordering::Relaxed),
            ambiguity_aborts: self.ambiguity_aborts.load(Ordering::Relaxed),
            trials: self.trials.load(Ordering::Relaxed),
        }
    }
}
