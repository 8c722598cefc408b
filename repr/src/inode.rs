//! Directory entries
//!
//! Every entry (and the root, stored in the superblock) is a 12 byte record of three
//! little endian words with packed bitfields, followed by `namelen << 2` bytes of NUL padded
//! name.
//!
//! ```text
//! word 0: mode    [0..16)  uid    [16..32)
//! word 1: size    [0..24)  gid    [24..32)
//! word 2: namelen [0..6)   offset [6..32)
//! ```
//!
//! `namelen` and `offset` are both stored in units of 4 bytes.

use static_assertions::const_assert_eq;
use std::fmt;
use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{AsBytes, FromBytes, Unaligned};

use crate::Mode;

pub const SIZE: usize = 12;

pub const MODE_WIDTH: u32 = 16;
pub const UID_WIDTH: u32 = 16;
pub const SIZE_WIDTH: u32 = 24;
pub const GID_WIDTH: u32 = 8;
pub const NAMELEN_WIDTH: u32 = 6;
pub const OFFSET_WIDTH: u32 = 26;

/// The longest name which can be stored in an entry
pub const MAX_NAME_LEN: usize = ((1 << NAMELEN_WIDTH) - 1) << 2;
/// The largest file size which can be stored in an entry
pub const MAX_FILE_SIZE: u32 = (1 << SIZE_WIDTH) - 1;
/// The largest byte offset an entry can point at
pub const MAX_OFFSET: u32 = ((1 << OFFSET_WIDTH) - 1) << 2;

#[derive(Copy, Clone, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct Inode {
    mode_uid: U32<LittleEndian>,
    size_gid: U32<LittleEndian>,
    namelen_offset: U32<LittleEndian>,
}

const_assert_eq!(std::mem::size_of::<Inode>(), SIZE);

impl Inode {
    /// Pack an entry record
    ///
    /// `name_len` is the padded length of the name in bytes and `offset` is a byte offset
    /// into the image; both must be multiples of 4.
    pub fn new(mode: Mode, uid: u16, size: u32, gid: u8, name_len: usize, offset: u32) -> Self {
        assert!(size <= MAX_FILE_SIZE);
        assert!(name_len <= MAX_NAME_LEN && name_len % 4 == 0);
        assert!(offset <= MAX_OFFSET && offset % 4 == 0);
        let mode_uid = u32::from(mode.bits()) | u32::from(uid) << MODE_WIDTH;
        let size_gid = size | u32::from(gid) << SIZE_WIDTH;
        let namelen_offset = (name_len as u32 >> 2) | (offset >> 2) << NAMELEN_WIDTH;
        Self {
            mode_uid: U32::new(mode_uid),
            size_gid: U32::new(size_gid),
            namelen_offset: U32::new(namelen_offset),
        }
    }

    #[inline]
    pub fn mode(&self) -> Mode {
        Mode::from_bits_truncate(self.mode_uid.get() as u16)
    }

    #[inline]
    pub fn uid(&self) -> u16 {
        (self.mode_uid.get() >> MODE_WIDTH) as u16
    }

    /// The file size. For device nodes this holds the device number instead
    #[inline]
    pub fn size(&self) -> u32 {
        self.size_gid.get() & MAX_FILE_SIZE
    }

    /// Only the low 8 bits of the group id are stored
    #[inline]
    pub fn gid(&self) -> u8 {
        (self.size_gid.get() >> SIZE_WIDTH) as u8
    }

    /// The stored name length, in units of 4 bytes
    #[inline]
    pub fn raw_namelen(&self) -> u32 {
        self.namelen_offset.get() & ((1 << NAMELEN_WIDTH) - 1)
    }

    /// The padded length of the name following this record, in bytes
    #[inline]
    pub fn name_len(&self) -> usize {
        (self.raw_namelen() as usize) << 2
    }

    /// The stored offset, in units of 4 bytes
    #[inline]
    pub fn raw_offset(&self) -> u32 {
        self.namelen_offset.get() >> NAMELEN_WIDTH
    }

    /// The byte offset of a directory's first entry, or of a file's block pointer table
    #[inline]
    pub fn offset(&self) -> u32 {
        self.raw_offset() << 2
    }
}

impl PartialEq for Inode {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Inode {}

impl fmt::Debug for Inode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Inode")
            .field("mode", &format_args!("{}", self.mode()))
            .field("uid", &self.uid())
            .field("size", &self.size())
            .field("gid", &self.gid())
            .field("name_len", &self.name_len())
            .field("offset", &self.offset())
            .finish()
    }
}
