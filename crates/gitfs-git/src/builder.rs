//! Pack file encoding.
//!
//! Produces v2 packs holding full objects, ref deltas and offset deltas.

use crate::pack::{OFS_DELTA, PACK_SIGNATURE, PACK_VERSION, REF_DELTA};
use crate::{GitError, Result};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use gitfs_storage::{ObjectId, ObjectType};
use sha1::{Digest, Sha1};
use std::io::Write;

#[derive(Debug, Clone)]
enum Entry {
    Full(ObjectType, Vec<u8>),
    RefDelta(ObjectId, Vec<u8>),
    OfsDelta(usize, Vec<u8>),
}

/// Builds a pack file from a sequence of records.
#[derive(Debug, Clone, Default)]
pub struct PackBuilder {
    entries: Vec<Entry>,
}

impl PackBuilder {
    /// Creates a new pack builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a full object, returning its record index.
    pub fn add(&mut self, object_type: ObjectType, data: &[u8]) -> usize {
        self.push(Entry::Full(object_type, data.to_vec()))
    }

    /// Adds a delta against the object `base`, which the reader must already have.
    pub fn add_ref_delta(&mut self, base: ObjectId, delta: &[u8]) -> usize {
        self.push(Entry::RefDelta(base, delta.to_vec()))
    }

    /// Adds a delta against the earlier record at index `base`.
    pub fn add_ofs_delta(&mut self, base: usize, delta: &[u8]) -> usize {
        self.push(Entry::OfsDelta(base, delta.to_vec()))
    }

    fn push(&mut self, entry: Entry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    /// Builds the pack file.
    pub fn build(self) -> Result<Vec<u8>> {
        let mut pack = Vec::new();

        pack.extend_from_slice(PACK_SIGNATURE);
        pack.extend_from_slice(&PACK_VERSION.to_be_bytes());
        pack.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());

        let mut offsets = Vec::with_capacity(self.entries.len());
        for (index, entry) in self.entries.iter().enumerate() {
            let offset = pack.len();
            offsets.push(offset);
            match entry {
                Entry::Full(object_type, data) => {
                    write_header(&mut pack, object_type.pack_type(), data.len());
                    write_compressed(&mut pack, data)?;
                }
                Entry::RefDelta(base, delta) => {
                    write_header(&mut pack, REF_DELTA, delta.len());
                    pack.extend_from_slice(base.as_bytes());
                    write_compressed(&mut pack, delta)?;
                }
                Entry::OfsDelta(base, delta) => {
                    let base_offset = offsets
                        .get(*base)
                        .filter(|_| *base < index)
                        .ok_or_else(|| {
                            GitError::InvalidPack(format!(
                                "record {index} deltas against later record {base}"
                            ))
                        })?;
                    write_header(&mut pack, OFS_DELTA, delta.len());
                    write_offset(&mut pack, (offset - base_offset) as u64);
                    write_compressed(&mut pack, delta)?;
                }
            }
        }

        let checksum = Sha1::digest(&pack);
        pack.extend_from_slice(&checksum);

        Ok(pack)
    }
}

/// Writes type and size in variable-length encoding.
/// First byte: (MSB=more bytes) (3 bits type) (4 bits size).
fn write_header(pack: &mut Vec<u8>, code: u8, size: usize) {
    let mut first_byte = (code << 4) | ((size & 0x0f) as u8);
    let mut remaining = size >> 4;
    if remaining > 0 {
        first_byte |= 0x80;
    }
    pack.push(first_byte);

    while remaining > 0 {
        let mut byte = (remaining & 0x7f) as u8;
        remaining >>= 7;
        if remaining > 0 {
            byte |= 0x80;
        }
        pack.push(byte);
    }
}

/// Writes an offset-delta distance, most significant group first.
fn write_offset(pack: &mut Vec<u8>, mut distance: u64) {
    let mut bytes = vec![(distance & 0x7f) as u8];
    distance >>= 7;
    while distance > 0 {
        distance -= 1;
        bytes.push(0x80 | (distance & 0x7f) as u8);
        distance >>= 7;
    }
    bytes.reverse();
    pack.extend_from_slice(&bytes);
}

fn write_compressed(pack: &mut Vec<u8>, data: &[u8]) -> Result<()> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| GitError::InvalidPack(e.to_string()))?;
    let compressed = encoder
        .finish()
        .map_err(|e| GitError::InvalidPack(e.to_string()))?;
    pack.extend_from_slice(&compressed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unpack;
    use gitfs_storage::ObjectStore;

    #[test]
    fn test_header_encoding() {
        let mut out = Vec::new();
        write_header(&mut out, 3, 10);
        assert_eq!(out, [0x3a]);

        out.clear();
        write_header(&mut out, 1, 16);
        assert_eq!(out, [0x90, 0x01]);
    }

    #[test]
    fn test_offset_encoding() {
        for (distance, expected) in [
            (5u64, &[0x05][..]),
            (127, &[0x7f]),
            (128, &[0x80, 0x00]),
            (383, &[0x81, 0x7f]),
        ] {
            let mut out = Vec::new();
            write_offset(&mut out, distance);
            assert_eq!(out, expected, "distance {distance}");
        }
    }

    #[test]
    fn test_forward_ofs_delta_rejected() {
        let mut builder = PackBuilder::new();
        builder.add_ofs_delta(0, b"\x00\x00");
        assert!(matches!(builder.build(), Err(GitError::InvalidPack(_))));
    }

    #[test]
    fn test_many_objects_with_long_offsets() {
        let mut builder = PackBuilder::new();
        let base = builder.add(ObjectType::Blob, b"base");
        for i in 0..200 {
            builder.add(ObjectType::Blob, format!("filler object {i}").as_bytes());
        }
        let delta = crate::DeltaBuilder::new(4).copy(0, 4).insert(b"!").build();
        let last = builder.add_ofs_delta(base, &delta);
        let pack = builder.build().unwrap();

        let mut store = ObjectStore::new();
        let summary = unpack(&pack, &mut store).unwrap();
        assert_eq!(summary.ids.len(), last + 1);
        assert_eq!(store.lookup(&summary.ids[last]).unwrap().data, b"base!");
    }
}
