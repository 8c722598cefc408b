//! A cramfs image is a single contiguous byte range, packed on 4 byte alignment:
//!
//! * [Superblock](superblock/index.html), at offset 0, or at offset 512 when the image
//!   carries a boot sector in front of it
//! * The root directory's entries, immediately following the superblock
//! * Directory entries: an [inode record](inode/index.html) followed by its padded name
//! * File data: per file, a table of `u32` cumulative end offsets (one per page), followed
//!   by the zlib compressed pages themselves
//!
//! All multi-byte values are little endian.

use bitflags::bitflags;

use std::fmt;
use std::fmt::Write;

pub mod inode;
pub mod superblock;

pub use zerocopy::{AsBytes, FromBytes};

pub const PAGE_SHIFT: u32 = 12;
/// The size of an uncompressed data page
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

bitflags! {
    #[derive(Default)]
    pub struct Mode: u16 {
        const OTHER_EXEC =  0o000_001;
        const OTHER_WRITE = 0o000_002;
        const OTHER_READ =  0o000_004;
        const GROUP_EXEC =  0o000_010;
        const GROUP_WRITE = 0o000_020;
        const GROUP_READ =  0o000_040;
        const USER_EXEC =   0o000_100;
        const USER_WRITE =  0o000_200;
        const USER_READ =   0o000_400;
        /// On regular files of a linear XIP mount, marks the file as execute-in-place
        const BIT_STICKY =  0o001_000;
        const BIT_SGID =    0o002_000;
        const BIT_SUID =    0o004_000;

        const TYPE_FIFO =   0o010_000;
        const TYPE_CHAR =   0o020_000;
        const TYPE_DIR  =   0o040_000;
        const TYPE_BLOCK =  0o060_000;
        const TYPE_FILE =   0o100_000;
        const TYPE_LINK =   0o120_000;
        const TYPE_SOCKET = 0o140_000;
    }
}

impl Mode {
    pub const O755: Mode = Mode { bits: 0o000_755 };
    pub const O644: Mode = Mode { bits: 0o000_644 };
    pub const PERM_MASK: Mode = Mode { bits: 0o007_777 };
    pub const TYPE_MASK: Mode = Mode { bits: 0o170_000 };
    pub const NONE: Mode = Mode { bits: 0 };

    /// The file type bits, without any permissions
    pub fn file_type(self) -> Mode {
        self & Mode::TYPE_MASK
    }

    pub fn is_dir(self) -> bool {
        self.file_type() == Mode::TYPE_DIR
    }

    pub fn is_file(self) -> bool {
        self.file_type() == Mode::TYPE_FILE
    }

    pub fn is_symlink(self) -> bool {
        self.file_type() == Mode::TYPE_LINK
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let type_char = match self.file_type() {
            Mode::TYPE_DIR => 'd',
            Mode::TYPE_CHAR => 'c',
            Mode::TYPE_BLOCK => 'b',
            Mode::TYPE_FILE => '-',
            Mode::TYPE_LINK => 'l',
            Mode::TYPE_SOCKET => 's',
            Mode::TYPE_FIFO => 'p',
            _ => '?',
        };
        f.write_char(type_char)?;

        // (read, write, exec, special bit, special char when exec is set)
        let triples = [
            (Mode::USER_READ, Mode::USER_WRITE, Mode::USER_EXEC, Mode::BIT_SUID, 's'),
            (Mode::GROUP_READ, Mode::GROUP_WRITE, Mode::GROUP_EXEC, Mode::BIT_SGID, 's'),
            (Mode::OTHER_READ, Mode::OTHER_WRITE, Mode::OTHER_EXEC, Mode::BIT_STICKY, 't'),
        ];
        for &(read, write, exec, special, special_char) in &triples {
            f.write_char(if self.contains(read) { 'r' } else { '-' })?;
            f.write_char(if self.contains(write) { 'w' } else { '-' })?;
            let exec_char = match (self.contains(exec), self.contains(special)) {
                (false, false) => '-',
                (true, false) => 'x',
                (false, true) => special_char.to_ascii_uppercase(),
                (true, true) => special_char,
            };
            f.write_char(exec_char)?;
        }

        Ok(())
    }
}

#[test]
fn mode_tests() {
    let mode = Mode { bits: 0o754 } | Mode::TYPE_FILE;
    assert_eq!(&format!("{}", mode), "-rwxr-xr--");
    let mode = mode | Mode::BIT_STICKY;
    assert_eq!(&format!("{}", mode), "-rwxr-xr-T");
    let mode = Mode { bits: 0o4755 } | Mode::TYPE_DIR;
    assert_eq!(&format!("{}", mode), "drwsr-xr-x");
    assert!(mode.is_dir());
    assert!(!mode.is_file());
}
