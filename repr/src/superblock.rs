use bitflags::bitflags;
use static_assertions::const_assert_eq;
use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{AsBytes, FromBytes, Unaligned};

use crate::inode;

/// The magic constant which marks a cramfs image
pub const MAGIC: u32 = 0x28cd_3d45;

/// The signature stored after the magic. Images with the `WRONG_SIGNATURE` flag may not
/// carry it, so it is informational only
pub const SIGNATURE: [u8; 16] = *b"Compressed ROMFS";

/// Images may start with a boot sector of this size; the superblock then follows it
pub const BOOT_SECTOR_SIZE: u32 = 512;

/// The size of the packed superblock
pub const SIZE: usize = 76;

/// Images without the `FSID_VERSION_2` flag do not record their size. This bounds them instead
pub const LEGACY_IMAGE_SIZE: u32 = 1 << 28;

/// Flag bits a reader may accept. Any other bit set means the image uses an unknown feature
pub const SUPPORTED_FLAGS: u32 = 0x0000_00ff
    | Flags::HOLES.bits
    | Flags::WRONG_SIGNATURE.bits
    | Flags::SHIFTED_ROOT_OFFSET.bits;

bitflags! {
    pub struct Flags: u32 {
        /// The fsid block carries the block and file counts, and `size` is valid
        const FSID_VERSION_2      = 0x0000_0001;
        /// Directory entries are sorted by name
        const SORTED_DIRS         = 0x0000_0002;
        /// Files may contain holes: zero length spans in their block pointer table
        const HOLES               = 0x0000_0100;
        /// The signature field does not hold [`SIGNATURE`](constant.SIGNATURE.html)
        const WRONG_SIGNATURE     = 0x0000_0200;
        /// The root directory's entries are not directly after the superblock
        const SHIFTED_ROOT_OFFSET = 0x0000_0400;
    }
}

/// The volume identification block
#[derive(Copy, Clone, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct Info {
    /// CRC32 of the whole image, computed with this field zeroed
    pub crc: U32<LittleEndian>,
    pub edition: U32<LittleEndian>,
    /// The number of data blocks in the image
    pub blocks: U32<LittleEndian>,
    /// The number of files in the image
    pub files: U32<LittleEndian>,
}

#[derive(Copy, Clone, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct Superblock {
    /// Must match the value of [`MAGIC`](constant.MAGIC.html) (`0x28cd3d45`) to be considered a
    /// cramfs image
    pub magic: U32<LittleEndian>,
    /// The length of the image in bytes. Only meaningful with `FSID_VERSION_2`
    pub size: U32<LittleEndian>,
    /// See [`Flags`](struct.Flags.html)
    pub flags: U32<LittleEndian>,
    /// Reserved
    pub future: U32<LittleEndian>,
    pub signature: [u8; 16],
    pub fsid: Info,
    /// The user supplied volume name, NUL padded
    pub name: [u8; 16],
    /// The directory entry describing the root directory
    pub root: inode::Inode,
}

const_assert_eq!(std::mem::size_of::<Info>(), 16);
const_assert_eq!(std::mem::size_of::<Superblock>(), SIZE);

impl Superblock {
    /// The flag word, with unknown bits dropped
    pub fn known_flags(&self) -> Flags {
        Flags::from_bits_truncate(self.flags.get())
    }

    /// Flag bits no reader understands
    pub fn unsupported_flags(&self) -> u32 {
        self.flags.get() & !SUPPORTED_FLAGS
    }

    pub fn has_magic(&self) -> bool {
        self.magic.get() == MAGIC
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_flags_cover_low_byte_and_known_features() {
        assert_eq!(SUPPORTED_FLAGS, 0x7ff);
        assert_eq!(SUPPORTED_FLAGS & 0x800, 0);
    }

    #[test]
    fn layout_offsets() {
        let mut bytes = [0u8; SIZE];
        bytes[0..4].copy_from_slice(&MAGIC.to_le_bytes());
        bytes[8..12].copy_from_slice(&0x1003u32.to_le_bytes());
        bytes[40..44].copy_from_slice(&7u32.to_le_bytes());
        bytes[44..48].copy_from_slice(&3u32.to_le_bytes());
        let sb = Superblock::read_from(&bytes[..]).unwrap();
        assert!(sb.has_magic());
        assert_eq!(sb.known_flags(), Flags::FSID_VERSION_2 | Flags::SORTED_DIRS);
        assert_eq!(sb.unsupported_flags(), 0x1000);
        assert_eq!(sb.fsid.blocks.get(), 7);
        assert_eq!(sb.fsid.files.get(), 3);
    }
}
