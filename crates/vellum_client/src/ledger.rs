//! Ledger read module wiring.
//!
//! `read` contains the pending-read state machine and the post-completion
//! entry enumeration, `reader` the client handle that owns the collaborators,
//! and `types` the shared id/config and trait contracts (topology, schedule,
//! digest, transport). `metadata`, `schedule` and `digest` provide the stock
//! implementations of those contracts; `permits` and `stats` cover admission
//! control and read statistics.

mod digest;
mod errors;
mod metadata;
mod permits;
mod read;
mod reader;
mod schedule;
mod stats;
mod types;

pub use digest::Crc32Digest;
pub use errors::{ReadError, ReplicaError};
pub use metadata::LedgerMetadata;
pub use permits::{PermitPool, ReadPermit};
pub use read::{LedgerEntries, LedgerEntry, PendingRead, ReadCallback, ReadHandle};
pub use reader::LedgerReader;
pub use schedule::RoundRobinSchedule;
pub use stats::{ReaderStats, ReaderStatsSnapshot};
pub use types::{
    DistributionSchedule, EntryDigest, EntryId, EntryPayload, LedgerId, LedgerTopology,
    ReaderConfig, ReplicaTransport,
};
