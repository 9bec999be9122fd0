//! Error taxonomy for the ledger read path.
//!
//! `ReplicaError` covers a single attempt against a single replica and is
//! recovered locally by moving to the next write-set candidate. `ReadError`
//! is the terminal outcome of a whole range read.

use thiserror::Error;

use crate::ledger::types::EntryId;

/// Outcome code of one read attempt against one replica.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ReplicaError {
    /// Request failed at the transport level (connect, send, timeout).
    #[error("replica read failed")]
    ReadFailed,
    /// Replica does not hold the requested entry.
    #[error("entry not found on replica")]
    EntryNotFound,
    /// Replica does not know the ledger at all.
    #[error("ledger not found on replica")]
    LedgerNotFound,
    /// Response arrived but failed integrity verification.
    #[error("entry digest mismatch")]
    DigestMismatch,
}

/// Terminal outcome of a range read.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ReadError {
    /// Single-entry probe answered not-found by a replica.
    #[error("entry not found")]
    EntryNotFound,
    /// Single-entry probe answered with an unknown ledger.
    #[error("ledger not found")]
    LedgerNotFound,
    /// An entry ran out of write-set candidates.
    ///
    /// `last` carries the failure code of the final attempt, which is the
    /// most recent information about why the entry is unreadable.
    #[error("read quorum exhausted at entry {entry}: {last}")]
    QuorumExhausted { entry: EntryId, last: ReplicaError },
    /// The caller cancelled the operation before it completed.
    #[error("read cancelled")]
    Cancelled,
}

impl ReadError {
    /// Map a per-attempt not-found code to its terminal form.
    ///
    /// Only meaningful for the probe path; other codes have no direct
    /// terminal equivalent and return `None`.
    pub(crate) fn from_not_found(code: ReplicaError) -> Option<Self> {
        match code {
            ReplicaError::EntryNotFound => Some(ReadError::EntryNotFound),
            ReplicaError::LedgerNotFound => Some(ReadError::LedgerNotFound),
            _ => None,
        }
    }
}
