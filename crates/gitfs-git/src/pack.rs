//! Git pack file decoding.
//!
//! Pack files are the format used by git for efficient object transfer.
//! See: https://git-scm.com/docs/pack-format

use crate::delta::apply_delta;
use crate::{GitError, Result};
use flate2::{Decompress, FlushDecompress, Status};
use gitfs_storage::{ObjectId, ObjectStore, ObjectType};
use sha1::{Digest, Sha1};
use std::collections::HashMap;

/// Magic bytes at the start of a pack file.
pub(crate) const PACK_SIGNATURE: &[u8; 4] = b"PACK";
/// Pack file version we support.
pub(crate) const PACK_VERSION: u32 = 2;
/// Header (signature, version, count) length.
const HEADER_LEN: usize = 12;
/// Trailing SHA-1 length.
const CHECKSUM_LEN: usize = 20;
/// Pack type code of an offset delta.
pub(crate) const OFS_DELTA: u8 = 6;
/// Pack type code of a ref delta.
pub(crate) const REF_DELTA: u8 = 7;
/// Nesting limit when an offset delta points at a record not yet decoded.
const MAX_BASE_DEPTH: usize = 64;
/// Worst-case zlib expansion ratio.
const MAX_INFLATE_RATIO: usize = 1032;

/// What a pack record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PackEntryKind {
    Full(ObjectType),
    OffsetDelta,
    RefDelta,
}

impl PackEntryKind {
    fn from_code(code: u8) -> Option<Self> {
        match code {
            OFS_DELTA => Some(Self::OffsetDelta),
            REF_DELTA => Some(Self::RefDelta),
            code => ObjectType::from_pack_type(code).map(Self::Full),
        }
    }
}

/// A record already decoded into the store.
#[derive(Debug, Clone, Copy)]
struct Decoded {
    object_type: ObjectType,
    id: ObjectId,
    len: usize,
}

/// The outcome of decoding a pack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackSummary {
    /// Object ids in record order.
    pub ids: Vec<ObjectId>,
    /// How many records were deltas.
    pub deltas: usize,
}

/// Decodes `data` as a v2 pack, inserting every object into `store`.
pub fn unpack(data: &[u8], store: &mut ObjectStore) -> Result<PackSummary> {
    PackDecoder::new(data)?.decode(store)
}

/// Decodes a validated pack archive.
pub struct PackDecoder<'a> {
    pack_len: usize,
    /// The object region: everything between header and checksum.
    objects: &'a [u8],
    count: u32,
    decoded: HashMap<usize, Decoded>,
}

impl<'a> PackDecoder<'a> {
    /// Validates the header and trailing checksum of `data`.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        if data.len() < HEADER_LEN + CHECKSUM_LEN {
            return Err(GitError::InvalidPack("pack too small".to_string()));
        }
        if &data[0..4] != PACK_SIGNATURE {
            return Err(GitError::InvalidPack("invalid signature".to_string()));
        }

        let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        match version {
            PACK_VERSION => {}
            3 => return Err(GitError::UnsupportedPackVersion(version)),
            _ => {
                return Err(GitError::InvalidPack(format!(
                    "unsupported version: {version}"
                )))
            }
        }

        let count = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);
        if count as usize >= data.len() {
            return Err(GitError::InvalidPack(format!(
                "{count} objects cannot fit in {} bytes",
                data.len()
            )));
        }

        let checksum_start = data.len() - CHECKSUM_LEN;
        let mut hasher = Sha1::new();
        hasher.update(&data[..checksum_start]);
        if hasher.finalize().as_slice() != &data[checksum_start..] {
            return Err(GitError::ChecksumMismatch);
        }

        Ok(Self {
            pack_len: data.len(),
            objects: &data[HEADER_LEN..checksum_start],
            count,
            decoded: HashMap::new(),
        })
    }

    /// Returns the declared object count.
    pub fn object_count(&self) -> u32 {
        self.count
    }

    /// Decodes every record into `store`.
    pub fn decode(mut self, store: &mut ObjectStore) -> Result<PackSummary> {
        if store.is_empty() {
            store.reserve(self.pack_len);
        }

        let mut summary = PackSummary {
            ids: Vec::with_capacity(self.count as usize),
            deltas: 0,
        };
        let mut pos = 0;
        for _ in 0..self.count {
            let record = match self.decoded.get(&pos).copied() {
                Some(record) => record,
                None => self.decode_at(pos, store, 0)?,
            };
            if self.is_delta(pos) {
                summary.deltas += 1;
            }
            summary.ids.push(record.id);
            pos += record.len;
        }

        if pos != self.objects.len() {
            return Err(GitError::TrailingGarbage(self.objects.len() - pos));
        }

        tracing::debug!(
            objects = summary.ids.len(),
            deltas = summary.deltas,
            bytes = self.pack_len,
            "decoded pack"
        );
        Ok(summary)
    }

    fn is_delta(&self, pos: usize) -> bool {
        self.objects
            .get(pos)
            .map(|byte| (byte >> 4) & 0x07)
            .is_some_and(|code| code == OFS_DELTA || code == REF_DELTA)
    }

    /// Decodes the record starting at `pos` within the object region.
    fn decode_at(
        &mut self,
        pos: usize,
        store: &mut ObjectStore,
        depth: usize,
    ) -> Result<Decoded> {
        let corrupt = |reason: &str| GitError::CorruptObjectData {
            position: pos,
            reason: reason.to_string(),
        };

        let (code, size, mut cursor) =
            read_entry_header(self.objects, pos).ok_or_else(|| corrupt("bad record header"))?;
        let kind =
            PackEntryKind::from_code(code).ok_or_else(|| corrupt("invalid object type"))?;
        let size = usize::try_from(size).map_err(|_| corrupt("record too large"))?;

        let base = match kind {
            PackEntryKind::Full(_) => None,
            PackEntryKind::RefDelta => {
                let raw = self
                    .objects
                    .get(cursor..cursor + ObjectId::LEN)
                    .ok_or_else(|| corrupt("truncated delta base"))?;
                cursor += ObjectId::LEN;
                let id = ObjectId::from_slice(raw)
                    .ok_or_else(|| corrupt("truncated delta base"))?;
                if !store.contains(&id) {
                    return Err(GitError::UnknownDeltaBase(id));
                }
                Some(id)
            }
            PackEntryKind::OffsetDelta => {
                let (distance, used) = read_offset(&self.objects[cursor..])
                    .ok_or_else(|| corrupt("bad delta offset"))?;
                cursor += used;
                let invalid = || GitError::InvalidDeltaOffset {
                    position: pos,
                    offset: distance,
                };
                if distance == 0 || distance > pos as u64 {
                    return Err(invalid());
                }
                let base_pos = pos - distance as usize;
                let base = match self.decoded.get(&base_pos).copied() {
                    Some(record) => record,
                    None if depth < MAX_BASE_DEPTH => self
                        .decode_at(base_pos, store, depth + 1)
                        .map_err(|_| invalid())?,
                    None => return Err(invalid()),
                };
                Some(base.id)
            }
        };

        let (data, consumed) = inflate(&self.objects[cursor..], size, pos)?;
        cursor += consumed;

        let (object_type, id) = match (kind, base) {
            (PackEntryKind::Full(object_type), _) => {
                (object_type, store.insert(object_type, &data))
            }
            (_, Some(base_id)) => {
                let base = store
                    .lookup(&base_id)
                    .ok_or(GitError::UnknownDeltaBase(base_id))?;
                let object_type = base.object_type;
                let target = apply_delta(base.data, &data, pos)?;
                (object_type, store.insert(object_type, &target))
            }
            (_, None) => return Err(corrupt("delta without base")),
        };

        let record = Decoded {
            object_type,
            id,
            len: cursor - pos,
        };
        tracing::trace!(position = pos, %id, kind = %record.object_type, "decoded record");
        self.decoded.insert(pos, record);
        Ok(record)
    }
}

/// Reads a record header: type code, inflated size and the position after it.
fn read_entry_header(data: &[u8], pos: usize) -> Option<(u8, u64, usize)> {
    let first = *data.get(pos)?;
    let code = (first >> 4) & 0x07;
    let mut size = u64::from(first & 0x0f);
    let mut shift = 4u32;
    let mut cursor = pos + 1;
    let mut byte = first;
    while byte & 0x80 != 0 {
        byte = *data.get(cursor)?;
        cursor += 1;
        let bits = u64::from(byte & 0x7f);
        if shift >= 64 || (bits << shift) >> shift != bits {
            return None;
        }
        size |= bits << shift;
        shift += 7;
    }
    Some((code, size, cursor))
}

/// Reads an offset-delta distance, returning it and the bytes consumed.
fn read_offset(data: &[u8]) -> Option<(u64, usize)> {
    let mut byte = *data.first()?;
    let mut distance = u64::from(byte & 0x7f);
    let mut used = 1;
    while byte & 0x80 != 0 {
        byte = *data.get(used)?;
        used += 1;
        distance = distance
            .checked_add(1)?
            .checked_mul(128)?
            | u64::from(byte & 0x7f);
    }
    Some((distance, used))
}

/// Inflates one zlib stream that must yield exactly `size` bytes.
///
/// Returns the data and the number of compressed bytes consumed.
fn inflate(input: &[u8], size: usize, position: usize) -> Result<(Vec<u8>, usize)> {
    let corrupt = |reason: String| GitError::CorruptObjectData { position, reason };

    let mut inflater = Decompress::new(true);
    let mut out = Vec::with_capacity(size.min(input.len().saturating_mul(MAX_INFLATE_RATIO)));
    let mut chunk = [0u8; 8192];
    loop {
        let in_before = inflater.total_in() as usize;
        let out_before = inflater.total_out();
        let status = inflater
            .decompress(&input[in_before..], &mut chunk, FlushDecompress::None)
            .map_err(|e| corrupt(format!("zlib: {e}")))?;
        let produced = (inflater.total_out() - out_before) as usize;
        out.extend_from_slice(&chunk[..produced]);
        if out.len() > size {
            return Err(corrupt(format!("inflates past declared size {size}")));
        }
        match status {
            Status::StreamEnd => break,
            _ if produced == 0 && inflater.total_in() as usize == in_before => {
                return Err(corrupt("truncated zlib stream".to_string()));
            }
            _ => {}
        }
    }

    if out.len() != size {
        return Err(corrupt(format!(
            "inflated {} bytes, expected {size}",
            out.len()
        )));
    }
    Ok((out, inflater.total_in() as usize))
}
