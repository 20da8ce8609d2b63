//! Tree object entry parsing.
//!
//! Each entry in a tree object is an octal mode, a space, the entry name, a
//! NUL byte and the 20-byte binary id of the entry's object. Entries are
//! sorted by name, but the encoding is not self-synchronizing, so lookups have
//! to scan linearly from the start.

use crate::ObjectId;

/// A single directory entry parsed from a tree object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeEntry<'a> {
    /// Mode bits, e.g. `0o100644` or `0o40000`.
    pub mode: u32,
    /// Entry name, borrowed from the tree data.
    pub name: &'a [u8],
    /// Id of the blob or tree the entry names.
    pub id: ObjectId,
}

impl<'a> TreeEntry<'a> {
    /// Parses the entry at the start of `data`.
    ///
    /// Returns the entry and the number of bytes it occupies, or `None` when
    /// the bytes are malformed.
    pub fn parse(data: &'a [u8]) -> Option<(Self, usize)> {
        let space = data.iter().position(|&b| b == b' ')?;
        let mut mode: u32 = 0;
        for &c in &data[..space] {
            if !(b'0'..=b'7').contains(&c) {
                return None;
            }
            mode = mode.checked_mul(8)?.checked_add(u32::from(c - b'0'))?;
        }

        let rest = &data[space + 1..];
        let nul = rest.iter().position(|&b| b == 0)?;
        let name = &rest[..nul];
        let id = ObjectId::from_slice(&rest[nul + 1..])?;

        let size = space + 1 + nul + 1 + ObjectId::LEN;
        Some((Self { mode, name, id }, size))
    }
}

/// Iterator over the entries of a tree object.
///
/// Iteration stops early at the first malformed entry.
#[derive(Debug, Clone)]
pub struct TreeEntries<'a> {
    data: &'a [u8],
}

impl<'a> TreeEntries<'a> {
    /// Iterates over the entries encoded in `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for TreeEntries<'a> {
    type Item = TreeEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.is_empty() {
            return None;
        }
        match TreeEntry::parse(self.data) {
            Some((entry, size)) => {
                self.data = &self.data[size..];
                Some(entry)
            }
            None => {
                tracing::debug!(remaining = self.data.len(), "malformed tree entry");
                self.data = &[];
                None
            }
        }
    }
}

/// Looks up `name` in the tree object `data`.
pub fn tree_lookup<'a>(data: &'a [u8], name: &[u8]) -> Option<TreeEntry<'a>> {
    TreeEntries::new(data).find(|entry| entry.name == name)
}
