//! Git delta programs.
//!
//! A delta starts with the source and target sizes as little-endian base-128
//! varints, followed by instructions that either copy a range of the base
//! object or insert literal bytes.
//!
//! See: https://git-scm.com/docs/pack-format#_deltified_representation

use crate::{GitError, Result};

/// Copy lengths of zero encode this many bytes.
const COPY_ZERO_LEN: usize = 0x10000;
/// Largest length a copy instruction can carry.
const MAX_COPY_LEN: usize = 0xff_ffff;
/// Largest literal run an insert instruction can carry.
const MAX_INSERT_LEN: usize = 0x7f;

/// Reads a little-endian base-128 varint, returning it and the bytes consumed.
fn read_size(data: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    let mut shift = 0u32;
    for (i, &byte) in data.iter().enumerate() {
        let bits = u64::from(byte & 0x7f);
        if shift >= 64 || (bits << shift) >> shift != bits {
            return None;
        }
        value |= bits << shift;
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
        shift += 7;
    }
    None
}

fn write_size(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Applies `delta` to `base`, producing the target object content.
///
/// `position` is the record's place in the pack, used for error reporting.
pub fn apply_delta(base: &[u8], delta: &[u8], position: usize) -> Result<Vec<u8>> {
    let corrupt = |reason: &str| GitError::CorruptObjectData {
        position,
        reason: reason.to_string(),
    };

    let (source_size, used) = read_size(delta).ok_or_else(|| corrupt("bad delta source size"))?;
    if source_size != base.len() as u64 {
        return Err(GitError::DeltaSizeMismatch {
            declared: source_size,
            actual: base.len(),
        });
    }
    let mut pos = used;

    let (target_size, used) =
        read_size(&delta[pos..]).ok_or_else(|| corrupt("bad delta target size"))?;
    let target_size =
        usize::try_from(target_size).map_err(|_| corrupt("delta target too large"))?;
    pos += used;

    // Each instruction byte yields at most one maximal copy.
    let bound = (delta.len() - pos).saturating_mul(COPY_ZERO_LEN);
    let mut out = Vec::with_capacity(target_size.min(bound));

    while pos < delta.len() {
        let op = delta[pos];
        pos += 1;

        if op & 0x80 != 0 {
            let mut offset = 0usize;
            for i in 0..4 {
                if op & (1 << i) != 0 {
                    let byte = *delta.get(pos).ok_or_else(|| corrupt("truncated copy"))?;
                    offset |= usize::from(byte) << (8 * i);
                    pos += 1;
                }
            }
            let mut len = 0usize;
            for i in 0..3 {
                if op & (0x10 << i) != 0 {
                    let byte = *delta.get(pos).ok_or_else(|| corrupt("truncated copy"))?;
                    len |= usize::from(byte) << (8 * i);
                    pos += 1;
                }
            }
            if len == 0 {
                len = COPY_ZERO_LEN;
            }

            let chunk = offset
                .checked_add(len)
                .and_then(|end| base.get(offset..end))
                .ok_or_else(|| corrupt("copy outside base object"))?;
            if out.len() + len > target_size {
                return Err(corrupt("copy past delta target"));
            }
            out.extend_from_slice(chunk);
        } else if op != 0 {
            let len = usize::from(op);
            let chunk = delta
                .get(pos..pos + len)
                .ok_or_else(|| corrupt("truncated insert"))?;
            if out.len() + len > target_size {
                return Err(corrupt("insert past delta target"));
            }
            out.extend_from_slice(chunk);
            pos += len;
        } else {
            return Err(corrupt("reserved delta opcode 0"));
        }
    }

    if out.len() != target_size {
        return Err(GitError::DeltaUnderflow {
            missing: target_size - out.len(),
        });
    }
    Ok(out)
}

/// Builds a delta program from copy and insert instructions.
#[derive(Debug, Clone)]
pub struct DeltaBuilder {
    source_size: usize,
    target_size: usize,
    ops: Vec<u8>,
}

impl DeltaBuilder {
    /// Creates a delta against a base of `source_size` bytes.
    pub fn new(source_size: usize) -> Self {
        Self {
            source_size,
            target_size: 0,
            ops: Vec::new(),
        }
    }

    /// Copies `len` bytes of the base starting at `offset`.
    pub fn copy(mut self, offset: u32, len: usize) -> Self {
        let mut offset = offset as usize;
        let mut remaining = len;
        while remaining > 0 {
            let chunk = remaining.min(MAX_COPY_LEN);
            self.push_copy(offset, chunk);
            offset += chunk;
            remaining -= chunk;
        }
        self
    }

    fn push_copy(&mut self, offset: usize, len: usize) {
        let at = self.ops.len();
        let mut op = 0x80u8;
        self.ops.push(op);
        for i in 0..4 {
            let byte = (offset >> (8 * i)) as u8;
            if byte != 0 {
                op |= 1 << i;
                self.ops.push(byte);
            }
        }
        if len != COPY_ZERO_LEN {
            for i in 0..3 {
                let byte = (len >> (8 * i)) as u8;
                if byte != 0 {
                    op |= 0x10 << i;
                    self.ops.push(byte);
                }
            }
        }
        self.ops[at] = op;
        self.target_size += len;
    }

    /// Inserts literal bytes.
    pub fn insert(mut self, data: &[u8]) -> Self {
        for chunk in data.chunks(MAX_INSERT_LEN) {
            self.ops.push(chunk.len() as u8);
            self.ops.extend_from_slice(chunk);
        }
        self.target_size += data.len();
        self
    }

    /// Encodes the delta.
    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.ops.len() + 20);
        write_size(&mut out, self.source_size as u64);
        write_size(&mut out, self.target_size as u64);
        out.extend_from_slice(&self.ops);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_varint() {
        let mut out = Vec::new();
        write_size(&mut out, 300);
        assert_eq!(out, [0xac, 0x02]);
        assert_eq!(read_size(&out), Some((300, 2)));
        assert_eq!(read_size(&[0x80]), None);
        assert_eq!(read_size(&[0xff; 11]), None);
    }

    #[test]
    fn test_copy_and_insert() {
        let base = b"hello, world";
        let delta = DeltaBuilder::new(base.len())
            .copy(7, 5)
            .insert(b" says ")
            .copy(0, 5)
            .build();
        assert_eq!(apply_delta(base, &delta, 0).unwrap(), b"world says hello");
    }

    #[test]
    fn test_copy_zero_length_means_64k() {
        let base: Vec<u8> = (0..COPY_ZERO_LEN + 10).map(|i| (i % 251) as u8).collect();
        let delta = DeltaBuilder::new(base.len()).copy(3, COPY_ZERO_LEN).build();
        // Source size (3 bytes), target size (3 bytes), then a copy with only
        // the offset byte present.
        assert_eq!(&delta[6..], [0x81, 0x03]);
        let out = apply_delta(&base, &delta, 0).unwrap();
        assert_eq!(out.len(), 65536);
        assert_eq!(out, base[3..3 + 65536]);
    }

    #[test]
    fn test_long_insert_is_split() {
        let literal = vec![b'z'; 300];
        let delta = DeltaBuilder::new(0).insert(&literal).build();
        assert_eq!(apply_delta(b"", &delta, 0).unwrap(), literal);
    }

    #[test]
    fn test_source_size_mismatch() {
        let delta = DeltaBuilder::new(4).insert(b"x").build();
        assert!(matches!(
            apply_delta(b"abc", &delta, 0),
            Err(GitError::DeltaSizeMismatch {
                declared: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_underflow() {
        let mut delta = Vec::new();
        write_size(&mut delta, 3);
        write_size(&mut delta, 5);
        delta.extend_from_slice(&[0x90, 0x03]); // copy 3 bytes from offset 0
        assert!(matches!(
            apply_delta(b"abc", &delta, 0),
            Err(GitError::DeltaUnderflow { missing: 2 })
        ));
    }

    #[test]
    fn test_overflowing_target() {
        let mut delta = Vec::new();
        write_size(&mut delta, 3);
        write_size(&mut delta, 2);
        delta.extend_from_slice(&[0x90, 0x03]);
        assert!(matches!(
            apply_delta(b"abc", &delta, 7),
            Err(GitError::CorruptObjectData { position: 7, .. })
        ));
    }

    #[test]
    fn test_malformed_programs() {
        let cases: [&[u8]; 5] = [
            &[0x03, 0x01, 0x00],             // opcode 0
            &[0x03, 0x01, 0x91],             // copy missing its bytes
            &[0x03, 0x01, 0x05, b'a'],       // insert runs off the end
            &[0x03, 0x04, 0x91, 0x01, 0x04], // copy past the base
            &[0x03],                         // no target size
        ];
        for delta in cases {
            assert!(
                matches!(
                    apply_delta(b"abc", delta, 0),
                    Err(GitError::CorruptObjectData { .. })
                ),
                "{delta:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_huge_target_does_not_allocate() {
        let mut delta = Vec::new();
        write_size(&mut delta, 0);
        write_size(&mut delta, u64::from(u32::MAX));
        assert!(matches!(
            apply_delta(b"", &delta, 0),
            Err(GitError::DeltaUnderflow { .. })
        ));
    }
}
