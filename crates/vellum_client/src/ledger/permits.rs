//! Admission control for replica reads.
//!
//! A `PermitPool` caps how many entry reads a reader (or a set of readers
//! sharing the pool) may have in flight. One permit covers one entry for the
//! whole of its lifecycle, retries included; it is released when the entry
//! reaches a terminal outcome, not between attempts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub struct PermitPool {
    sem: Arc<Semaphore>,
    capacity: usize,
    taken: AtomicU64,
    released: AtomicU64,
}

impl PermitPool {
    /// Create a pool with `capacity` permits (at least one).
    pub fn new(capacity: usize) -> Arc<Self> {
        let capacity = capacity.max(1);
        Arc::new(Self {
            sem: Arc::new(Semaphore::new(capacity)),
            capacity,
            taken: AtomicU64::new(0),
            released: AtomicU64::new(0),
        })
    }

    /// Acquire a permit, waiting until one frees up.
    pub async fn acquire(self: &Arc<Self>) -> ReadPermit {
        // The pool never closes its semaphore, so acquire_owned cannot fail.
        let permit = self
            .sem
            .clone()
            .acquire_owned()
            .await
            .expect("permit pool semaphore closed");
        self.taken.fetch_add(1, Ordering::Relaxed);
        ReadPermit {
            pool: self.clone(),
            _permit: permit,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently free.
    pub fn available(&self) -> usize {
        self.sem.available_permits()
    }

    /// Total permits handed out since creation.
    pub fn taken(&self) -> u64 {
        self.taken.load(Ordering::Relaxed)
    }

    /// Total permits returned since creation.
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }
}

/// Guard that returns the permit to the pool on drop.
pub struct ReadPermit {
    pool: Arc<PermitPool>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for ReadPermit {
    fn drop(&mut self) {
        self.pool.released.fetch_add(1, Ordering::Relaxed);
    }
}
