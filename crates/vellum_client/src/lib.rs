//! Quorum read client for a replicated append-only ledger store.
//!
//! This crate implements the client-side read path: fetching a contiguous
//! range of ledger entries from storage replicas, retrying failed or corrupt
//! reads against alternate replicas in each entry's write set, and delivering
//! the ordered result to the caller exactly once. Higher layers supply a
//! `LedgerTopology` and a `ReplicaTransport`, then drive reads through
//! `LedgerReader`.

pub mod ledger;
