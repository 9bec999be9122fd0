//! Shared helpers for quorum read tests.
//!
//! `ScriptedTransport` plays the role of the storage replicas: each
//! (replica, entry) pair can be scripted to succeed, fail with a specific
//! code, return a corrupted envelope, or do any of those after a delay. It
//! records every attempt and tracks the in-flight high-water mark so tests
//! can assert on retry order and admission behavior.

// Each test binary uses a different slice of these helpers.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::sync::oneshot;

use vellum_client::ledger::{
    Crc32Digest, EntryDigest, EntryId, LedgerEntries, LedgerId, LedgerMetadata, LedgerReader,
    LedgerTopology, PermitPool, ReadCallback, ReadError, ReaderConfig, ReplicaError,
    ReplicaTransport,
};

pub const LEDGER: LedgerId = 7;

/// Deadline for any single await in a test.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Install a fmt subscriber when RUST_LOG is set; repeated calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    if std::env::var_os("RUST_LOG").is_none() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Replica address `10.1.0.<i>:3181`.
pub fn replica(i: usize) -> SocketAddr {
    format!("10.1.0.{i}:3181").parse().expect("replica addr")
}

/// Deterministic payload for an entry.
pub fn entry_data(entry: EntryId) -> Vec<u8> {
    format!("entry-{entry:04}-payload").into_bytes()
}

/// Ledger length field stored in the envelope for an entry.
pub fn entry_length(entry: EntryId) -> u64 {
    (entry + 1) * 64
}

/// Well-formed envelope for an entry of the test ledger.
pub fn encode_entry(entry: EntryId) -> Bytes {
    Crc32Digest.encode(LEDGER, entry, entry, entry_length(entry), &entry_data(entry))
}

/// Metadata with a single ensemble segment starting at entry 0.
pub fn single_segment(replicas: usize, write_quorum: usize) -> LedgerMetadata {
    let mut segments = BTreeMap::new();
    segments.insert(0u64, (0..replicas).map(replica).collect());
    LedgerMetadata::new(LEDGER, segments, write_quorum).expect("metadata")
}

/// Scripted behavior for one replica read.
#[derive(Clone, Debug)]
pub enum Script {
    Ok,
    OkAfter(Duration),
    /// Well-formed envelope with one payload byte flipped.
    Corrupt,
    Fail(ReplicaError),
    FailAfter(ReplicaError, Duration),
}

/// In-memory replica transport driven by scripts.
pub struct ScriptedTransport {
    by_entry: Mutex<HashMap<(SocketAddr, EntryId), Script>>,
    by_replica: Mutex<HashMap<SocketAddr, Script>>,
    attempts: Mutex<Vec<(EntryId, SocketAddr)>>,
    inflight: AtomicUsize,
    inflight_peak: AtomicUsize,
}

impl ScriptedTransport {
    /// Transport where every unscripted read succeeds.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            by_entry: Mutex::new(HashMap::new()),
            by_replica: Mutex::new(HashMap::new()),
            attempts: Mutex::new(Vec::new()),
            inflight: AtomicUsize::new(0),
            inflight_peak: AtomicUsize::new(0),
        })
    }

    /// Script every read served by `addr`.
    pub fn script_replica(&self, addr: SocketAddr, script: Script) {
        self.by_replica.lock().unwrap().insert(addr, script);
    }

    /// Script one (replica, entry) pair; wins over the replica-wide script.
    pub fn script_entry(&self, addr: SocketAddr, entry: EntryId, script: Script) {
        self.by_entry.lock().unwrap().insert((addr, entry), script);
    }

    /// Replicas tried for `entry`, in attempt order.
    pub fn attempts_for(&self, entry: EntryId) -> Vec<SocketAddr> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _)| *e == entry)
            .map(|(_, addr)| *addr)
            .collect()
    }

    /// Total attempts across all entries.
    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    /// Highest number of concurrently in-flight reads observed.
    pub fn inflight_peak(&self) -> usize {
        self.inflight_peak.load(Ordering::SeqCst)
    }

    fn script_for(&self, addr: SocketAddr, entry: EntryId) -> Script {
        if let Some(script) = self.by_entry.lock().unwrap().get(&(addr, entry)) {
            return script.clone();
        }
        if let Some(script) = self.by_replica.lock().unwrap().get(&addr) {
            return script.clone();
        }
        Script::Ok
    }
}

fn corrupted(envelope: Bytes) -> Bytes {
    let mut raw = BytesMut::from(&envelope[..]);
    let last = raw.len() - 1;
    raw[last] ^= 0x01;
    raw.freeze()
}

#[async_trait]
impl ReplicaTransport for ScriptedTransport {
    async fn read_entry(
        &self,
        replica: SocketAddr,
        _ledger: LedgerId,
        entry: EntryId,
    ) -> Result<Bytes, ReplicaError> {
        self.attempts.lock().unwrap().push((entry, replica));
        let live = self.inflight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inflight_peak.fetch_max(live, Ordering::SeqCst);
        let result = match self.script_for(replica, entry) {
            Script::Ok => Ok(encode_entry(entry)),
            Script::OkAfter(delay) => {
                tokio::time::sleep(delay).await;
                Ok(encode_entry(entry))
            }
            Script::Corrupt => Ok(corrupted(encode_entry(entry))),
            Script::Fail(code) => Err(code),
            Script::FailAfter(code, delay) => {
                tokio::time::sleep(delay).await;
                Err(code)
            }
        };
        self.inflight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Topology decorator counting ensemble resolutions.
pub struct CountingTopology {
    inner: LedgerMetadata,
    resolutions: AtomicUsize,
}

impl CountingTopology {
    pub fn new(inner: LedgerMetadata) -> Arc<Self> {
        Arc::new(Self {
            inner,
            resolutions: AtomicUsize::new(0),
        })
    }

    pub fn resolutions(&self) -> usize {
        self.resolutions.load(Ordering::SeqCst)
    }
}

impl LedgerTopology for CountingTopology {
    fn ensemble(&self, entry: EntryId) -> Vec<SocketAddr> {
        self.resolutions.fetch_add(1, Ordering::SeqCst);
        self.inner.ensemble(entry)
    }

    fn next_ensemble_change(&self, entry: EntryId) -> Option<EntryId> {
        self.inner.next_ensemble_change(entry)
    }

    fn write_quorum(&self) -> usize {
        self.inner.write_quorum()
    }
}

/// Reader over scripted replicas with a fresh permit pool.
pub fn reader(
    metadata: LedgerMetadata,
    transport: &Arc<ScriptedTransport>,
    permits: usize,
) -> LedgerReader {
    reader_with_config(metadata, transport, permits, ReaderConfig::default())
}

pub fn reader_with_config(
    metadata: LedgerMetadata,
    transport: &Arc<ScriptedTransport>,
    permits: usize,
    config: ReaderConfig,
) -> LedgerReader {
    LedgerReader::with_metadata(
        metadata,
        config,
        transport.clone(),
        PermitPool::new(permits),
    )
}

/// Callback capturing the terminal outcome in a oneshot.
pub fn capture() -> (
    ReadCallback,
    oneshot::Receiver<Result<LedgerEntries, ReadError>>,
) {
    let (tx, rx) = oneshot::channel();
    let callback: ReadCallback = Box::new(move |outcome| {
        let _ = tx.send(outcome);
    });
    (callback, rx)
}

/// Await a captured outcome with the test deadline.
pub async fn recv_outcome(
    rx: oneshot::Receiver<Result<LedgerEntries, ReadError>>,
) -> Result<LedgerEntries, ReadError> {
    tokio::time::timeout(TEST_TIMEOUT, rx)
        .await
        .expect("read did not finish in time")
        .expect("callback dropped without firing")
}

/// Wait until the pool has every permit back.
pub async fn wait_for_pool_idle(pool: &Arc<PermitPool>) {
    let deadline = tokio::time::Instant::now() + TEST_TIMEOUT;
    while pool.available() < pool.capacity() {
        if tokio::time::Instant::now() > deadline {
            panic!(
                "permit pool did not drain: available {} of {}",
                pool.available(),
                pool.capacity()
            );
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
