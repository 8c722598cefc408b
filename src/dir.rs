//! Directory decoding
//!
//! A directory's content is a run of entries, each an inode record followed by its name,
//! NUL padded to a multiple of 4 bytes. There is no entry count: a directory ends when its
//! size in bytes is used up.

use bstr::{BStr, BString, ByteSlice};
use repr::inode::SIZE as ENTRY_HEADER_SIZE;
use repr::FromBytes;
use snafu::{ensure, OptionExt};
use std::cmp::Ordering;

use crate::errors::*;
use crate::inode::{FileType, Inode};
use crate::read::Inner;

/// One decoded entry, as handed out by [`Filesystem::readdir`](../struct.Filesystem.html#method.readdir)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    name: BString,
    inode: Inode,
    offset: u32,
    next_offset: u32,
}

impl DirEntry {
    pub fn name(&self) -> &BStr {
        self.name.as_bstr()
    }

    pub fn into_name(self) -> BString {
        self.name
    }

    pub fn ino(&self) -> u32 {
        self.inode.ino()
    }

    pub fn file_type(&self) -> FileType {
        self.inode.file_type()
    }

    pub fn inode(&self) -> &Inode {
        &self.inode
    }

    /// Where this entry starts, relative to the start of the directory
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// The cursor to resume listing after this entry
    pub fn next_offset(&self) -> u32 {
        self.next_offset
    }
}

/// Walks the raw entries of one directory, from a cursor relative to its start
///
/// Stops for good after the first error.
pub(crate) struct Entries<'a> {
    fs: &'a Inner,
    start: u32,
    size: u32,
    pos: u32,
    failed: bool,
}

impl<'a> Entries<'a> {
    pub(crate) fn new(fs: &'a Inner, dir: &Inode, pos: u32) -> Self {
        // Offset 0 is the superblock: a directory there has no entries, whatever its size
        let size = if dir.offset() == 0 { 0 } else { dir.size() };
        Self {
            fs,
            start: dir.offset(),
            size,
            pos,
            failed: false,
        }
    }

    fn decode(&self) -> Result<DirEntry> {
        let offset = self.start.checked_add(self.pos).context(OutOfBounds {
            offset: u64::from(self.start) + u64::from(self.pos),
            len: ENTRY_HEADER_SIZE,
            limit: u64::from(u32::MAX),
        })?;
        let raw = {
            let view = self.fs.read(offset, ENTRY_HEADER_SIZE)?;
            repr::inode::Inode::read_from(&*view).context(OutOfBounds {
                offset,
                len: ENTRY_HEADER_SIZE,
                limit: view.len() as u64,
            })?
        };

        let name_offset = offset + ENTRY_HEADER_SIZE as u32;
        let name_len = raw.name_len();
        let name = {
            let view = self.fs.read(name_offset, name_len)?;
            BString::from(view.trim_end_with(|c| c == '\0'))
        };
        ensure!(!name.is_empty(), EmptyName { offset });

        let next_offset = self.pos + (ENTRY_HEADER_SIZE + name_len) as u32;
        Ok(DirEntry {
            name,
            inode: Inode::from_raw(&raw, self.fs.options().timestamp),
            offset: self.pos,
            next_offset,
        })
    }
}

impl Iterator for Entries<'_> {
    type Item = Result<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.size {
            return None;
        }
        match self.decode() {
            Ok(entry) => {
                self.pos = entry.next_offset;
                Some(Ok(entry))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Find `name` in `dir`
///
/// Names must match exactly in length and bytes. On a directory flagged as sorted, the scan
/// stops at the first entry that would sort after `name`.
pub(crate) fn lookup(fs: &Inner, dir: &Inode, name: &[u8]) -> Result<Option<Inode>> {
    ensure!(dir.is_dir(), NotDirectory { ino: dir.ino() });
    let first = match name.first() {
        Some(&first) => first,
        None => return Ok(None),
    };
    let sorted = fs.sorted_dirs();

    for entry in Entries::new(fs, dir, 0) {
        let entry = entry?;
        if sorted && first < entry.name[0] {
            break;
        }
        if entry.name.len() != name.len() {
            continue;
        }
        match name.cmp(entry.name.as_slice()) {
            Ordering::Greater => continue,
            Ordering::Equal => return Ok(Some(entry.inode)),
            Ordering::Less if sorted => break,
            Ordering::Less => continue,
        }
    }
    Ok(None)
}

/// A lazy listing of a directory, see [`Filesystem::readdir`](../struct.Filesystem.html#method.readdir)
pub struct ReadDir<'a> {
    entries: Option<Entries<'a>>,
}

impl<'a> ReadDir<'a> {
    pub(crate) fn new(fs: &'a Inner, dir: &Inode, cursor: u32) -> Result<Self> {
        ensure!(dir.is_dir(), NotDirectory { ino: dir.ino() });
        if cursor >= dir.size() {
            return Ok(Self { entries: None });
        }
        ensure!(cursor % 4 == 0, UnalignedCursor { offset: cursor });
        Ok(Self {
            entries: Some(Entries::new(fs, dir, cursor)),
        })
    }
}

impl Iterator for ReadDir<'_> {
    type Item = Result<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.as_mut()?.next()
    }
}
