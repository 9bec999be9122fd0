//! Shared types for the ledger read path.
//!
//! These types are kept in a small, dependency-light module because they are
//! used by both the read state machine and the topology/transport layers.

use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::Bytes;

use crate::ledger::errors::ReplicaError;

/// Logical identifier for a ledger (one append-only log).
pub type LedgerId = u64;
/// Position of an entry within its ledger, starting at 0.
pub type EntryId = u64;

/// Verified entry payload extracted from a replica response.
///
/// `length` is the ledger length field carried in the entry envelope, i.e.
/// the number of payload bytes the writer had confirmed up to this entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryPayload {
    pub data: Bytes,
    pub length: u64,
}

/// Tuning for a reader handle.
#[derive(Clone, Copy, Debug)]
pub struct ReaderConfig {
    /// Treat a replica-reported not-found as terminal for single-entry reads.
    ///
    /// Probe reads (recovery checking whether an entry was ever written) want
    /// the first authoritative not-found answer immediately instead of one
    /// per write-set member. Clearing this makes not-found retry like any
    /// other per-attempt failure.
    pub probe_not_found_is_terminal: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            probe_not_found_is_terminal: true,
        }
    }
}

/// Replica placement view of one ledger.
///
/// An ensemble is the ordered list of replica addresses storing a contiguous
/// run of entries. Ensembles change at segment boundaries (e.g. after a
/// replica is replaced); entries between two boundaries share one ensemble.
pub trait LedgerTopology: Send + Sync + 'static {
    /// Ensemble responsible for `entry`.
    fn ensemble(&self, entry: EntryId) -> Vec<SocketAddr>;

    /// First entry id after `entry` where the ensemble changes, if any.
    fn next_ensemble_change(&self, entry: EntryId) -> Option<EntryId>;

    /// Number of replicas each entry is written to.
    fn write_quorum(&self) -> usize;
}

/// Maps an entry to the ensemble positions holding a copy of it.
///
/// The returned indices are ordered; readers try them in order, so position 0
/// is the preferred replica for that entry.
pub trait DistributionSchedule: Send + Sync + 'static {
    fn write_set(&self, entry: EntryId) -> Vec<usize>;
}

/// Entry envelope encoding and integrity verification.
pub trait EntryDigest: Send + Sync + 'static {
    /// Build the wire envelope for an entry.
    fn encode(
        &self,
        ledger: LedgerId,
        entry: EntryId,
        last_confirmed: EntryId,
        length: u64,
        payload: &[u8],
    ) -> Bytes;

    /// Check a raw replica response and extract the payload.
    ///
    /// Any inconsistency (bad checksum, truncated envelope, id mismatch) is
    /// reported as `ReplicaError::DigestMismatch`.
    fn verify_and_extract(
        &self,
        ledger: LedgerId,
        entry: EntryId,
        raw: Bytes,
    ) -> Result<EntryPayload, ReplicaError>;
}

/// Transport interface for replica read requests.
///
/// The read path is transport-agnostic; concrete implementations can use a
/// real RPC stack, in-memory channels, or test harnesses. Implementations own
/// their request timeouts and map every transport-level failure to a
/// `ReplicaError` code.
#[async_trait]
pub trait ReplicaTransport: Send + Sync + 'static {
    async fn read_entry(
        &self,
        replica: SocketAddr,
        ledger: LedgerId,
        entry: EntryId,
    ) -> Result<Bytes, ReplicaError>;
}
