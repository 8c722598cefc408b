use chrono::{DateTime, Utc};
use repr::Mode;
use std::fmt;

use crate::PAGE_SIZE;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FileType {
    Fifo,
    CharDevice,
    Directory,
    BlockDevice,
    RegularFile,
    Symlink,
    Socket,
    Unknown,
}

impl FileType {
    pub fn from_mode(mode: Mode) -> Self {
        match mode.file_type() {
            Mode::TYPE_FIFO => FileType::Fifo,
            Mode::TYPE_CHAR => FileType::CharDevice,
            Mode::TYPE_DIR => FileType::Directory,
            Mode::TYPE_BLOCK => FileType::BlockDevice,
            Mode::TYPE_FILE => FileType::RegularFile,
            Mode::TYPE_LINK => FileType::Symlink,
            Mode::TYPE_SOCKET => FileType::Socket,
            _ => FileType::Unknown,
        }
    }

    /// The `d_type` style code: the type bits of the mode, shifted down
    pub fn code(self) -> u8 {
        let mode = match self {
            FileType::Fifo => Mode::TYPE_FIFO,
            FileType::CharDevice => Mode::TYPE_CHAR,
            FileType::Directory => Mode::TYPE_DIR,
            FileType::BlockDevice => Mode::TYPE_BLOCK,
            FileType::RegularFile => Mode::TYPE_FILE,
            FileType::Symlink => Mode::TYPE_LINK,
            FileType::Socket => Mode::TYPE_SOCKET,
            FileType::Unknown => Mode::NONE,
        };
        (mode.bits() >> 12) as u8
    }
}

/// An in-memory inode, decoded from a directory entry (or the superblock's root entry)
///
/// Inodes are plain values: they hold no reference into the image, and two lookups of the
/// same entry produce equal inodes.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Inode {
    ino: u32,
    mode: Mode,
    uid: u16,
    gid: u8,
    size: u32,
    rdev: Option<u32>,
    offset: u32,
    mtime: DateTime<Utc>,
}

/// The inode number of an entry: its content offset, or 1 when it has none
pub fn inode_number(raw: &repr::inode::Inode) -> u32 {
    match raw.raw_offset() {
        0 => 1,
        offset => offset << 2,
    }
}

impl Inode {
    pub(crate) fn from_raw(raw: &repr::inode::Inode, mtime: DateTime<Utc>) -> Self {
        let mode = raw.mode();
        let (size, rdev) = match FileType::from_mode(mode) {
            FileType::RegularFile | FileType::Directory | FileType::Symlink => (raw.size(), None),
            // Device nodes keep their device number in the size field
            _ => (0, Some(raw.size())),
        };
        Self {
            ino: inode_number(raw),
            mode,
            uid: raw.uid(),
            gid: raw.gid(),
            size,
            rdev,
            offset: raw.offset(),
            mtime,
        }
    }

    pub fn ino(&self) -> u32 {
        self.ino
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn file_type(&self) -> FileType {
        FileType::from_mode(self.mode)
    }

    pub fn uid(&self) -> u16 {
        self.uid
    }

    pub fn gid(&self) -> u8 {
        self.gid
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// The device number of a device node (or fifo/socket, where it is meaningless)
    pub fn rdev(&self) -> Option<u32> {
        self.rdev
    }

    /// The byte offset of a directory's entries, or of a file's block pointer table
    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn mtime(&self) -> DateTime<Utc> {
        self.mtime
    }

    /// cramfs can't count links without reading every directory
    pub fn nlink(&self) -> u32 {
        1
    }

    /// Size in 512 byte units
    pub fn blocks(&self) -> u64 {
        (u64::from(self.size) + 511) / 512
    }

    pub fn block_size(&self) -> u32 {
        PAGE_SIZE as u32
    }

    /// The number of data pages, the last one possibly partial
    pub fn page_count(&self) -> u32 {
        ((u64::from(self.size) + PAGE_SIZE as u64 - 1) / PAGE_SIZE as u64) as u32
    }

    pub fn is_dir(&self) -> bool {
        self.mode.is_dir()
    }

    pub fn is_file(&self) -> bool {
        self.mode.is_file()
    }

    pub fn is_symlink(&self) -> bool {
        self.mode.is_symlink()
    }

    /// Regular files carrying the sticky bit are stored uncompressed, for mapping in place
    pub fn is_xip(&self) -> bool {
        self.is_file() && self.mode.contains(Mode::BIT_STICKY)
    }
}

impl fmt::Debug for Inode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Inode")
            .field("ino", &self.ino)
            .field("mode", &format_args!("{}", self.mode))
            .field("uid", &self.uid)
            .field("gid", &self.gid)
            .field("size", &self.size)
            .field("rdev", &self.rdev)
            .field("offset", &self.offset)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn decode(raw: repr::inode::Inode) -> Inode {
        Inode::from_raw(&raw, Utc.timestamp(0, 0))
    }

    #[test]
    fn inode_numbers_follow_offsets() {
        let root = repr::inode::Inode::new(Mode::TYPE_DIR | Mode::O755, 0, 0, 0, 0, 0);
        assert_eq!(decode(root).ino(), 1);

        let file = repr::inode::Inode::new(Mode::TYPE_FILE | Mode::O644, 0, 10, 0, 8, 0x120);
        let file = decode(file);
        assert_eq!(file.ino(), 0x120);
        assert_eq!(file.offset(), 0x120);
        assert_eq!(file.size(), 10);
        assert_eq!(file.blocks(), 1);
        assert_eq!(file.page_count(), 1);
        assert_eq!(file.file_type(), FileType::RegularFile);
        assert_eq!(file.file_type().code(), 8);
    }

    #[test]
    fn devices_expose_rdev() {
        let raw = repr::inode::Inode::new(Mode::TYPE_CHAR | Mode::O644, 0, 0x0501, 0, 4, 0);
        let dev = decode(raw);
        assert_eq!(dev.size(), 0);
        assert_eq!(dev.rdev(), Some(0x0501));
        assert_eq!(dev.file_type(), FileType::CharDevice);
        assert_eq!(dev.page_count(), 0);
    }

    #[test]
    fn xip_needs_a_regular_file() {
        let sticky = Mode::BIT_STICKY | Mode::O755;
        let file = decode(repr::inode::Inode::new(sticky | Mode::TYPE_FILE, 0, 1, 0, 4, 4));
        let dir = decode(repr::inode::Inode::new(sticky | Mode::TYPE_DIR, 0, 1, 0, 4, 4));
        assert!(file.is_xip());
        assert!(!dir.is_xip());
    }

    #[test]
    fn page_counts() {
        let sized = |size| decode(repr::inode::Inode::new(Mode::TYPE_FILE, 0, size, 0, 4, 4));
        assert_eq!(sized(0).page_count(), 0);
        assert_eq!(sized(4096).page_count(), 1);
        assert_eq!(sized(4097).page_count(), 2);
        assert_eq!(sized(4097).blocks(), 9);
    }
}
