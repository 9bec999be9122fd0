//! Pending read state machine.
//!
//! A `PendingRead` fans one range read out into per-entry tasks. Each task
//! owns one admission permit and walks its entry's write set until a replica
//! returns a verifiable copy or the candidates run out. Entry completions
//! race; the last verified entry (or the first terminal failure, or a
//! cancel) finalizes the operation and fires the caller's callback exactly
//! once.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::time::Instant;

use crate::ledger::errors::{ReadError, ReplicaError};
use crate::ledger::permits::ReadPermit;
use crate::ledger::reader::{LedgerReader, ReaderShared};
use crate::ledger::types::{EntryId, EntryPayload, LedgerId};

/// Terminal callback invoked with the outcome of a range read.
pub type ReadCallback = Box<dyn FnOnce(Result<LedgerEntries, ReadError>) + Send + 'static>;

/// One entry's mutable read state.
///
/// Only the entry's own task advances `next_replica` and writes `payload`;
/// the slot is shared so the enumeration surface can drain it afterwards.
struct EntrySlot {
    entry_id: EntryId,
    next_replica: AtomicU32,
    payload: Mutex<Option<EntryPayload>>,
}

struct ReadState {
    reader: Arc<ReaderShared>,
    first_entry: EntryId,
    last_entry: EntryId,
    /// Entries still waiting for a verified copy. Zero means the range is
    /// complete; only verified successes decrement it.
    pending: AtomicI64,
    /// One-shot guard deciding the single winner between the countdown,
    /// quorum-exhaustion and cancellation finalization paths.
    finalized: AtomicBool,
    started_at: Instant,
    callback: Mutex<Option<ReadCallback>>,
    slots: Vec<EntrySlot>,
}

/// A range read that has been constructed but not yet dispatched.
pub struct PendingRead {
    reader: Arc<ReaderShared>,
    first_entry: EntryId,
    last_entry: EntryId,
    callback: ReadCallback,
}

impl PendingRead {
    /// Build a read over the inclusive range `[first, last]`.
    pub fn new(
        reader: &LedgerReader,
        first: EntryId,
        last: EntryId,
        callback: ReadCallback,
    ) -> anyhow::Result<Self> {
        if first > last {
            anyhow::bail!("invalid entry range: first {first} > last {last}");
        }
        Ok(Self {
            reader: reader.shared().clone(),
            first_entry: first,
            last_entry: last,
            callback,
        })
    }

    /// Dispatch the read.
    ///
    /// Walks the range in ascending order, acquiring one admission permit per
    /// entry (suspending while the pool is empty) and spawning that entry's
    /// attempt task. The ensemble is resolved once per placement segment, at
    /// the first entry and again at each change boundary; entries in between
    /// reuse the cached ensemble.
    pub async fn initiate(self) -> ReadHandle {
        let count = self.last_entry - self.first_entry + 1;
        let state = Arc::new(ReadState {
            slots: (self.first_entry..=self.last_entry)
                .map(|entry_id| EntrySlot {
                    entry_id,
                    next_replica: AtomicU32::new(0),
                    payload: Mutex::new(None),
                })
                .collect(),
            reader: self.reader,
            first_entry: self.first_entry,
            last_entry: self.last_entry,
            pending: AtomicI64::new(count as i64),
            finalized: AtomicBool::new(false),
            started_at: Instant::now(),
            callback: Mutex::new(Some(self.callback)),
        });

        let mut ensemble: Arc<Vec<SocketAddr>> = Arc::new(Vec::new());
        let mut next_change: Option<EntryId> = None;
        let mut resolved = false;
        for index in 0..state.slots.len() {
            let entry_id = state.slots[index].entry_id;
            // Do not queue for a permit the operation can no longer use.
            if state.finalized.load(Ordering::Acquire) {
                break;
            }
            let permit = state.reader.permits.acquire().await;
            // A finalize while we waited (cancel, or an already-dispatched
            // entry failing terminally) makes the rest of the walk pointless.
            if state.finalized.load(Ordering::Acquire) {
                break;
            }
            tracing::debug!(
                ledger_id = state.reader.ledger_id,
                entry_id,
                "acquired read permit"
            );
            if !resolved || next_change.map_or(false, |change| entry_id >= change) {
                ensemble = Arc::new(state.reader.topology.ensemble(entry_id));
                next_change = state.reader.topology.next_ensemble_change(entry_id);
                resolved = true;
            }
            let state = state.clone();
            let ensemble = ensemble.clone();
            tokio::spawn(async move {
                state.run_entry(index, ensemble, permit).await;
            });
        }
        ReadHandle { state }
    }
}

impl ReadState {
    /// Drive one entry to a terminal outcome.
    ///
    /// The permit is held across retries and released (by drop) only when
    /// this task returns, whatever the outcome.
    async fn run_entry(
        self: Arc<Self>,
        index: usize,
        ensemble: Arc<Vec<SocketAddr>>,
        permit: ReadPermit,
    ) {
        let _permit = permit;
        let slot = &self.slots[index];
        let reader = &self.reader;
        let write_set = reader.schedule.write_set(slot.entry_id);
        let single_entry = self.first_entry == self.last_entry;
        let mut last_err = ReplicaError::ReadFailed;
        loop {
            if self.finalized.load(Ordering::Acquire) {
                return;
            }
            let cursor = slot.next_replica.load(Ordering::Relaxed) as usize;
            if cursor >= write_set.len() {
                self.finalize(Err(ReadError::QuorumExhausted {
                    entry: slot.entry_id,
                    last: last_err,
                }));
                return;
            }
            slot.next_replica.fetch_add(1, Ordering::Relaxed);
            let Some(replica) = ensemble.get(write_set[cursor]).copied() else {
                // Schedule and ensemble disagree on positions; count it as a
                // failed attempt so the op exhausts instead of wedging.
                tracing::warn!(
                    ledger_id = reader.ledger_id,
                    entry_id = slot.entry_id,
                    position = write_set[cursor],
                    "write set position outside ensemble"
                );
                last_err = ReplicaError::ReadFailed;
                continue;
            };
            match reader
                .transport
                .read_entry(replica, reader.ledger_id, slot.entry_id)
                .await
            {
                Ok(raw) => {
                    match reader
                        .digest
                        .verify_and_extract(reader.ledger_id, slot.entry_id, raw)
                    {
                        Ok(payload) => {
                            self.complete_entry(index, payload);
                            return;
                        }
                        Err(err) => {
                            tracing::warn!(
                                ledger_id = reader.ledger_id,
                                entry_id = slot.entry_id,
                                replica = %replica,
                                "entry failed verification, trying next replica"
                            );
                            last_err = err;
                        }
                    }
                }
                Err(err) => {
                    if single_entry && reader.config.probe_not_found_is_terminal {
                        if let Some(terminal) = ReadError::from_not_found(err) {
                            self.finalize(Err(terminal));
                            return;
                        }
                    }
                    tracing::warn!(
                        ledger_id = reader.ledger_id,
                        entry_id = slot.entry_id,
                        replica = %replica,
                        error = %err,
                        "replica read failed, trying next replica"
                    );
                    last_err = err;
                }
            }
        }
    }

    /// Store a verified payload and count the entry down.
    fn complete_entry(self: &Arc<Self>, index: usize, payload: EntryPayload) {
        let slot = &self.slots[index];
        *slot.payload.lock().unwrap() = Some(payload);
        let left = self.pending.fetch_sub(1, Ordering::AcqRel) - 1;
        if left == 0 {
            self.finalize(Ok(()));
        } else if left < 0 {
            // Two successes for one entry would have to race past the
            // single-task-per-entry ownership; log instead of corrupting
            // terminal state.
            tracing::error!(
                ledger_id = self.reader.ledger_id,
                entry_id = slot.entry_id,
                "read completion counter went negative"
            );
        }
    }

    /// Resolve the operation exactly once and fire the callback.
    fn finalize(self: &Arc<Self>, outcome: Result<(), ReadError>) {
        if self.finalized.swap(true, Ordering::AcqRel) {
            return;
        }
        let elapsed = self.started_at.elapsed();
        tracing::debug!(
            ledger_id = self.reader.ledger_id,
            first_entry = self.first_entry,
            last_entry = self.last_entry,
            ok = outcome.is_ok(),
            elapsed_us = elapsed.as_micros().min(u128::from(u64::MAX)) as u64,
            "read complete"
        );
        let Some(callback) = self.callback.lock().unwrap().take() else {
            return;
        };
        match outcome {
            Ok(()) => {
                self.reader.stats.record_success(elapsed);
                callback(Ok(LedgerEntries::new(self.clone())));
            }
            Err(err) => {
                self.reader.stats.record_failure(elapsed);
                callback(Err(err));
            }
        }
    }
}

/// Handle to a dispatched read.
pub struct ReadHandle {
    state: Arc<ReadState>,
}

impl ReadHandle {
    /// Cancel the read.
    ///
    /// If no terminal outcome has been reached yet, the callback fires with
    /// `ReadError::Cancelled`; in-flight entry tasks stop retrying and their
    /// permits return to the pool. After a terminal outcome this is a no-op.
    pub fn cancel(&self) {
        self.state.finalize(Err(ReadError::Cancelled));
    }

    /// Whether the operation has reached its terminal outcome.
    pub fn is_complete(&self) -> bool {
        self.state.finalized.load(Ordering::Acquire)
    }
}

/// One verified ledger entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerEntry {
    pub ledger_id: LedgerId,
    pub entry_id: EntryId,
    pub data: Bytes,
    /// Ledger length field from the entry envelope.
    pub length: u64,
}

/// Completed entries of a successful read, in ascending entry-id order.
///
/// Iteration drains the underlying operation state: each entry is handed out
/// once, and a second pass yields nothing.
pub struct LedgerEntries {
    state: Arc<ReadState>,
    next: usize,
}

impl std::fmt::Debug for LedgerEntries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerEntries")
            .field("ledger_id", &self.state.reader.ledger_id)
            .field("remaining", &self.remaining())
            .finish()
    }
}

impl LedgerEntries {
    fn new(state: Arc<ReadState>) -> Self {
        Self { state, next: 0 }
    }

    /// Entries not yet drained.
    pub fn remaining(&self) -> usize {
        self.state.slots[self.next..]
            .iter()
            .filter(|slot| slot.payload.lock().unwrap().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

impl Iterator for LedgerEntries {
    type Item = LedgerEntry;

    fn next(&mut self) -> Option<LedgerEntry> {
        while self.next < self.state.slots.len() {
            let slot = &self.state.slots[self.next];
            self.next += 1;
            if let Some(payload) = slot.payload.lock().unwrap().take() {
                return Some(LedgerEntry {
                    ledger_id: self.state.reader.ledger_id,
                    entry_id: slot.entry_id,
                    data: payload.data,
                    length: payload.length,
                });
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for LedgerEntries {}
