//! Open files and directories.

use crate::boundary::guard;
use crate::{FsError, Result};
use gitfs_storage::{ObjectStore, ObjectType, TreeEntry};
use std::io::{self, BufRead, Cursor, Read, Seek, SeekFrom};

/// Mode reported for files: a read-only regular file.
pub const MODE_FILE: u32 = 0o100444;
/// Mode reported for directories: a read-only, searchable directory.
pub const MODE_DIR: u32 = 0o040555;

const MODE_TYPE_MASK: u32 = 0o170000;

/// Metadata for an opened path or a directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Path used to reach the node. Directory entries use their name.
    pub path: String,
    /// Final path element.
    pub name: String,
    /// Content length in bytes; zero for directories.
    pub size: u64,
    /// Unix-style mode bits, [`MODE_FILE`] or [`MODE_DIR`].
    pub mode: u32,
}

impl FileInfo {
    fn file(path: &str, name: &str, size: usize) -> Self {
        Self {
            path: path.to_string(),
            name: name.to_string(),
            size: size as u64,
            mode: MODE_FILE,
        }
    }

    fn dir(path: &str, name: &str) -> Self {
        Self {
            path: path.to_string(),
            name: name.to_string(),
            size: 0,
            mode: MODE_DIR,
        }
    }

    /// Returns true for directories.
    pub fn is_dir(&self) -> bool {
        self.mode & MODE_TYPE_MASK == MODE_DIR & MODE_TYPE_MASK
    }
}

/// An opened path: a file or a directory.
#[derive(Debug)]
pub enum Node<'a> {
    /// A blob.
    File(FileView<'a>),
    /// A tree.
    Directory(DirView<'a>),
}

impl<'a> Node<'a> {
    /// Returns metadata for the node.
    pub fn stat(&self) -> &FileInfo {
        match self {
            Self::File(f) => f.stat(),
            Self::Directory(d) => d.stat(),
        }
    }

    /// Returns true if the node is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory(_))
    }

    /// Reads file content into `buf`.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self {
            Self::File(f) => f.cursor.read(buf).map_err(|source| FsError::Io {
                path: f.info.path.clone(),
                source,
            }),
            Self::Directory(d) => Err(FsError::NotAFile {
                path: d.info.path.clone(),
            }),
        }
    }

    /// Seeks within a file, or rewinds a directory.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        match self {
            Self::File(f) => f.seek_to(pos),
            Self::Directory(d) => d.seek(pos),
        }
    }

    /// Lists directory entries; see [`DirView::read_dir`].
    pub fn read_dir(&mut self, limit: Option<usize>) -> Result<DirPage> {
        match self {
            Self::Directory(d) => d.read_dir(limit),
            Self::File(f) => Err(FsError::NotADirectory {
                path: f.info.path.clone(),
            }),
        }
    }

    /// Rewinds a directory listing to its first entry.
    pub fn rewind(&mut self) -> Result<()> {
        match self {
            Self::Directory(d) => {
                d.rewind();
                Ok(())
            }
            Self::File(f) => Err(FsError::NotADirectory {
                path: f.info.path.clone(),
            }),
        }
    }

    /// Converts into a file view.
    pub fn into_file(self) -> Result<FileView<'a>> {
        match self {
            Self::File(f) => Ok(f),
            Self::Directory(d) => Err(FsError::NotAFile { path: d.info.path }),
        }
    }

    /// Converts into a directory view.
    pub fn into_dir(self) -> Result<DirView<'a>> {
        match self {
            Self::Directory(d) => Ok(d),
            Self::File(f) => Err(FsError::NotADirectory { path: f.info.path }),
        }
    }
}

/// A regular file backed by blob content in the store.
///
/// Implements [`Read`], [`BufRead`] and [`Seek`] without copying the content.
#[derive(Debug, Clone)]
pub struct FileView<'a> {
    info: FileInfo,
    cursor: Cursor<&'a [u8]>,
}

impl<'a> FileView<'a> {
    pub(crate) fn new(path: &str, name: &str, data: &'a [u8]) -> Self {
        Self {
            info: FileInfo::file(path, name, data.len()),
            cursor: Cursor::new(data),
        }
    }

    /// Returns metadata for the file.
    pub fn stat(&self) -> &FileInfo {
        &self.info
    }

    /// Returns the content length in bytes.
    pub fn len(&self) -> u64 {
        self.info.size
    }

    /// Returns true for an empty file.
    pub fn is_empty(&self) -> bool {
        self.info.size == 0
    }

    /// Returns the whole content, independent of the read position.
    pub fn contents(&self) -> &'a [u8] {
        self.cursor.get_ref()
    }

    fn seek_to(&mut self, pos: SeekFrom) -> Result<u64> {
        self.cursor.seek(pos).map_err(|_| FsError::InvalidSeek {
            path: self.info.path.clone(),
        })
    }
}

impl Read for FileView<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl BufRead for FileView<'_> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.cursor.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.cursor.consume(amt);
    }
}

impl Seek for FileView<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

/// One batch of directory entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirPage {
    /// Entries in tree order.
    pub entries: Vec<FileInfo>,
    /// Set when the listing found nothing left to return.
    pub end: bool,
}

/// A directory backed by a tree object, listed incrementally.
#[derive(Debug, Clone)]
pub struct DirView<'a> {
    store: &'a ObjectStore,
    info: FileInfo,
    data: &'a [u8],
    offset: usize,
}

impl<'a> DirView<'a> {
    pub(crate) fn new(store: &'a ObjectStore, path: &str, name: &str, data: &'a [u8]) -> Self {
        Self {
            store,
            info: FileInfo::dir(path, name),
            data,
            offset: 0,
        }
    }

    /// Returns metadata for the directory.
    pub fn stat(&self) -> &FileInfo {
        &self.info
    }

    /// Returns up to `limit` further entries, or all remaining ones for `None`
    /// or `Some(0)`.
    ///
    /// Entries are produced in tree order. The call that returns the last
    /// entries does not report the end; the next call returns an empty page
    /// with [`DirPage::end`] set. A malformed entry ends the listing.
    pub fn read_dir(&mut self, limit: Option<usize>) -> Result<DirPage> {
        let path = self.info.path.clone();
        guard("readdir", &path, || Ok(self.scan(limit)))
    }

    fn scan(&mut self, limit: Option<usize>) -> DirPage {
        let limit = limit.filter(|&n| n > 0);
        let mut entries = Vec::new();
        while limit.map_or(true, |n| entries.len() < n) && self.offset < self.data.len() {
            let Some((entry, size)) = TreeEntry::parse(&self.data[self.offset..]) else {
                break;
            };
            self.offset += size;
            entries.push(self.entry_info(&entry));
        }
        let end = entries.is_empty();
        DirPage { entries, end }
    }

    fn entry_info(&self, entry: &TreeEntry<'_>) -> FileInfo {
        let name = String::from_utf8_lossy(entry.name);
        match self.store.lookup(&entry.id) {
            Some(object) if object.object_type == ObjectType::Tree => FileInfo::dir(&name, &name),
            Some(object) if object.object_type == ObjectType::Blob => {
                FileInfo::file(&name, &name, object.data.len())
            }
            _ => FileInfo::file(&name, &name, 0),
        }
    }

    /// Resets the listing to the first entry.
    pub fn rewind(&mut self) {
        self.offset = 0;
    }

    /// Only a seek to the start is supported; it rewinds the listing.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        if pos == SeekFrom::Start(0) {
            self.rewind();
            Ok(0)
        } else {
            Err(FsError::InvalidSeek {
                path: self.info.path.clone(),
            })
        }
    }
}
