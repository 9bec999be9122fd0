//! Client-side cached view of one ledger's replica placement.
//!
//! Metadata arrives from a control plane (fetching and watching it is out of
//! scope here); this module only validates it and answers placement queries
//! during a read. Segments are keyed by the first entry id they cover, so
//! ensemble lookup is a floor search and boundary lookup is the next key.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::ledger::types::{EntryId, LedgerId, LedgerTopology};

/// Placement metadata for one ledger.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "RawLedgerMetadata")]
pub struct LedgerMetadata {
    ledger_id: LedgerId,
    /// First covered entry id -> ensemble for that segment.
    segments: BTreeMap<EntryId, Vec<SocketAddr>>,
    ensemble_size: usize,
    write_quorum: usize,
}

/// Unvalidated wire form. Deserialization funnels through
/// [`LedgerMetadata::new`] so a malformed blob is rejected up front instead
/// of panicking on the first placement query.
#[derive(Deserialize)]
struct RawLedgerMetadata {
    ledger_id: LedgerId,
    segments: BTreeMap<EntryId, Vec<SocketAddr>>,
    ensemble_size: usize,
    write_quorum: usize,
}

impl TryFrom<RawLedgerMetadata> for LedgerMetadata {
    type Error = anyhow::Error;

    fn try_from(raw: RawLedgerMetadata) -> Result<Self, Self::Error> {
        let metadata = Self::new(raw.ledger_id, raw.segments, raw.write_quorum)?;
        if metadata.ensemble_size != raw.ensemble_size {
            anyhow::bail!(
                "ledger {} metadata claims ensemble size {}, segments have {}",
                metadata.ledger_id,
                raw.ensemble_size,
                metadata.ensemble_size
            );
        }
        Ok(metadata)
    }
}

impl LedgerMetadata {
    /// Validate and build a metadata view.
    ///
    /// Every ledger has a segment starting at entry 0 and all segments share
    /// one ensemble size; the write quorum cannot exceed it.
    pub fn new(
        ledger_id: LedgerId,
        segments: BTreeMap<EntryId, Vec<SocketAddr>>,
        write_quorum: usize,
    ) -> anyhow::Result<Self> {
        let Some(first) = segments.values().next() else {
            anyhow::bail!("ledger {ledger_id} has no ensemble segments");
        };
        let ensemble_size = first.len();
        if !segments.contains_key(&0) {
            anyhow::bail!("ledger {ledger_id} metadata missing the segment at entry 0");
        }
        for (start, ensemble) in &segments {
            if ensemble.is_empty() {
                anyhow::bail!("ledger {ledger_id} segment at {start} has an empty ensemble");
            }
            if ensemble.len() != ensemble_size {
                anyhow::bail!(
                    "ledger {ledger_id} segment at {start} has {} replicas, expected {}",
                    ensemble.len(),
                    ensemble_size
                );
            }
        }
        if write_quorum == 0 || write_quorum > ensemble_size {
            anyhow::bail!(
                "write quorum {write_quorum} out of range for ensemble size {ensemble_size}"
            );
        }
        Ok(Self {
            ledger_id,
            segments,
            ensemble_size,
            write_quorum,
        })
    }

    pub fn ledger_id(&self) -> LedgerId {
        self.ledger_id
    }

    pub fn ensemble_size(&self) -> usize {
        self.ensemble_size
    }

    /// Segment covering `entry` (floor lookup).
    fn segment(&self, entry: EntryId) -> &Vec<SocketAddr> {
        // The constructor guarantees a segment at key 0, so the floor search
        // always finds one.
        self.segments
            .range(..=entry)
            .next_back()
            .map(|(_, ensemble)| ensemble)
            .expect("segment at entry 0 exists")
    }
}

impl LedgerTopology for LedgerMetadata {
    fn ensemble(&self, entry: EntryId) -> Vec<SocketAddr> {
        self.segment(entry).clone()
    }

    fn next_ensemble_change(&self, entry: EntryId) -> Option<EntryId> {
        self.segments
            .range(entry + 1..)
            .next()
            .map(|(start, _)| *start)
    }

    fn write_quorum(&self) -> usize {
        self.write_quorum
    }
}
