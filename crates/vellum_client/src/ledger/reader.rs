//! Client handle for reading one ledger.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::ledger::digest::Crc32Digest;
use crate::ledger::metadata::LedgerMetadata;
use crate::ledger::permits::PermitPool;
use crate::ledger::read::{LedgerEntries, PendingRead};
use crate::ledger::schedule::RoundRobinSchedule;
use crate::ledger::stats::ReaderStats;
use crate::ledger::types::{
    DistributionSchedule, EntryDigest, EntryId, LedgerId, LedgerTopology, ReaderConfig,
    ReplicaTransport,
};

/// Collaborators shared by every read dispatched through one reader.
pub(crate) struct ReaderShared {
    pub(crate) ledger_id: LedgerId,
    pub(crate) config: ReaderConfig,
    pub(crate) topology: Arc<dyn LedgerTopology>,
    pub(crate) schedule: Arc<dyn DistributionSchedule>,
    pub(crate) digest: Arc<dyn EntryDigest>,
    pub(crate) transport: Arc<dyn ReplicaTransport>,
    pub(crate) permits: Arc<PermitPool>,
    pub(crate) stats: Arc<ReaderStats>,
}

/// Read handle for one ledger.
///
/// Cheap to clone; reads dispatched through clones share the same admission
/// pool and statistics.
#[derive(Clone)]
pub struct LedgerReader {
    shared: Arc<ReaderShared>,
}

impl LedgerReader {
    pub fn new(
        ledger_id: LedgerId,
        config: ReaderConfig,
        topology: Arc<dyn LedgerTopology>,
        schedule: Arc<dyn DistributionSchedule>,
        digest: Arc<dyn EntryDigest>,
        transport: Arc<dyn ReplicaTransport>,
        permits: Arc<PermitPool>,
    ) -> Self {
        Self {
            shared: Arc::new(ReaderShared {
                ledger_id,
                config,
                topology,
                schedule,
                digest,
                transport,
                permits,
                stats: Arc::new(ReaderStats::new()),
            }),
        }
    }

    /// Build a reader from placement metadata with the stock round-robin
    /// schedule and CRC32 digest.
    pub fn with_metadata(
        metadata: LedgerMetadata,
        config: ReaderConfig,
        transport: Arc<dyn ReplicaTransport>,
        permits: Arc<PermitPool>,
    ) -> Self {
        let schedule = RoundRobinSchedule::new(metadata.ensemble_size(), metadata.write_quorum());
        Self::new(
            metadata.ledger_id(),
            config,
            Arc::new(metadata),
            Arc::new(schedule),
            Arc::new(Crc32Digest),
            transport,
            permits,
        )
    }

    pub(crate) fn shared(&self) -> &Arc<ReaderShared> {
        &self.shared
    }

    pub fn ledger_id(&self) -> LedgerId {
        self.shared.ledger_id
    }

    pub fn stats(&self) -> &ReaderStats {
        &self.shared.stats
    }

    pub fn permits(&self) -> &Arc<PermitPool> {
        &self.shared.permits
    }

    /// Read the inclusive entry range `[first, last]` and wait for the
    /// terminal outcome.
    ///
    /// Convenience wrapper over `PendingRead`: the terminal callback is
    /// bridged through a oneshot channel. A terminal `ReadError` is
    /// preserved in the returned error chain and can be downcast.
    pub async fn read_entries(
        &self,
        first: EntryId,
        last: EntryId,
    ) -> anyhow::Result<LedgerEntries> {
        let (tx, rx) = oneshot::channel();
        let op = PendingRead::new(
            self,
            first,
            last,
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        )?;
        let _handle = op.initiate().await;
        match rx.await {
            Ok(Ok(entries)) => Ok(entries),
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(anyhow::anyhow!(
                "read of ledger {} dropped before completion",
                self.shared.ledger_id
            )),
        }
    }
}
