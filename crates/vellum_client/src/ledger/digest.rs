//! CRC32 entry envelope.
//!
//! Replicas store and return entries as an envelope of four big-endian u64
//! metadata fields (ledger id, entry id, last confirmed entry, ledger
//! length), a CRC32 over metadata and payload, then the payload bytes. The
//! checksum excludes itself.

use bytes::{Bytes, BytesMut};
use crc32fast::Hasher;

use crate::ledger::errors::ReplicaError;
use crate::ledger::types::{EntryDigest, EntryId, EntryPayload, LedgerId};

const METADATA_LEN: usize = 32;
const HEADER_LEN: usize = METADATA_LEN + 4;

#[derive(Clone, Copy, Debug, Default)]
pub struct Crc32Digest;

fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut out = [0u8; 8];
    out.copy_from_slice(&buf[at..at + 8]);
    u64::from_be_bytes(out)
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut out = [0u8; 4];
    out.copy_from_slice(&buf[at..at + 4]);
    u32::from_be_bytes(out)
}

impl EntryDigest for Crc32Digest {
    fn encode(
        &self,
        ledger: LedgerId,
        entry: EntryId,
        last_confirmed: EntryId,
        length: u64,
        payload: &[u8],
    ) -> Bytes {
        let mut out = BytesMut::with_capacity(HEADER_LEN + payload.len());
        out.extend_from_slice(&ledger.to_be_bytes());
        out.extend_from_slice(&entry.to_be_bytes());
        out.extend_from_slice(&last_confirmed.to_be_bytes());
        out.extend_from_slice(&length.to_be_bytes());
        let mut hasher = Hasher::new();
        hasher.update(&out[..METADATA_LEN]);
        hasher.update(payload);
        out.extend_from_slice(&hasher.finalize().to_be_bytes());
        out.extend_from_slice(payload);
        out.freeze()
    }

    fn verify_and_extract(
        &self,
        ledger: LedgerId,
        entry: EntryId,
        raw: Bytes,
    ) -> Result<EntryPayload, ReplicaError> {
        if raw.len() < HEADER_LEN {
            return Err(ReplicaError::DigestMismatch);
        }
        // A response carrying the wrong ids is as untrustworthy as a bad
        // checksum; both collapse to the same retryable code.
        if read_u64(&raw, 0) != ledger || read_u64(&raw, 8) != entry {
            return Err(ReplicaError::DigestMismatch);
        }
        let length = read_u64(&raw, METADATA_LEN - 8);
        let expected_crc = read_u32(&raw, METADATA_LEN);
        let mut hasher = Hasher::new();
        hasher.update(&raw[..METADATA_LEN]);
        hasher.update(&raw[HEADER_LEN..]);
        if hasher.finalize() != expected_crc {
            return Err(ReplicaError::DigestMismatch);
        }
        Ok(EntryPayload {
            data: raw.slice(HEADER_LEN..),
            length,
        })
    }
}
