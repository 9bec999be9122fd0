//! Read operation statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Point-in-time copy of the reader counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReaderStatsSnapshot {
    pub reads_ok: u64,
    pub reads_failed: u64,
    pub ok_total_us: u64,
    pub ok_max_us: u64,
    pub failed_total_us: u64,
    pub failed_max_us: u64,
}

/// Atomic counters covering whole read operations (not single attempts).
#[derive(Debug, Default)]
pub struct ReaderStats {
    reads_ok: AtomicU64,
    reads_failed: AtomicU64,
    ok_total_us: AtomicU64,
    ok_max_us: AtomicU64,
    failed_total_us: AtomicU64,
    failed_max_us: AtomicU64,
}

impl ReaderStats {
    pub const fn new() -> Self {
        Self {
            reads_ok: AtomicU64::new(0),
            reads_failed: AtomicU64::new(0),
            ok_total_us: AtomicU64::new(0),
            ok_max_us: AtomicU64::new(0),
            failed_total_us: AtomicU64::new(0),
            failed_max_us: AtomicU64::new(0),
        }
    }

    /// Record end-to-end latency for a read that delivered entries.
    pub fn record_success(&self, elapsed: Duration) {
        let us = elapsed.as_micros().min(u128::from(u64::MAX)) as u64;
        self.reads_ok.fetch_add(1, Ordering::Relaxed);
        self.ok_total_us.fetch_add(us, Ordering::Relaxed);
        self.ok_max_us.fetch_max(us, Ordering::Relaxed);
    }

    /// Record end-to-end latency for a read that finished with an error.
    pub fn record_failure(&self, elapsed: Duration) {
        let us = elapsed.as_micros().min(u128::from(u64::MAX)) as u64;
        self.reads_failed.fetch_add(1, Ordering::Relaxed);
        self.failed_total_us.fetch_add(us, Ordering::Relaxed);
        self.failed_max_us.fetch_max(us, Ordering::Relaxed);
    }

    /// Return the current snapshot and reset counters.
    pub fn snapshot_and_reset(&self) -> ReaderStatsSnapshot {
        ReaderStatsSnapshot {
            reads_ok: self.reads_ok.swap(0, Ordering::Relaxed),
            reads_failed: self.reads_failed.swap(0, Ordering::Relaxed),
            ok_total_us: self.ok_total_us.swap(0, Ordering::Relaxed),
            ok_max_us: self.ok_max_us.swap(0, Ordering::Relaxed),
            failed_total_us: self.failed_total_us.swap(0, Ordering::Relaxed),
            failed_max_us: self.failed_max_us.swap(0, Ordering::Relaxed),
        }
    }
}
