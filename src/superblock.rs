use bstr::{BString, ByteSlice};
use repr::superblock::{Flags, BOOT_SECTOR_SIZE, LEGACY_IMAGE_SIZE, SIZE};
use repr::FromBytes;
use slog::Logger;
use snafu::{ensure, OptionExt};

use crate::accessor::Accessor;
use crate::errors::*;

/// The validated contents of an image's superblock
#[derive(Debug, Clone)]
pub struct Superblock {
    /// Where the superblock was found: 0, or 512 behind a boot sector
    pub base: u32,
    pub flags: Flags,
    /// The image size bounding every read. Legacy images get a fixed bound
    pub size: u32,
    /// Data block count, 0 on legacy images
    pub blocks: u32,
    /// File count, 0 on legacy images
    pub files: u32,
    pub edition: u32,
    pub name: BString,
    /// The root directory's entry
    pub root: repr::inode::Inode,
}

impl Superblock {
    pub fn sorted_dirs(&self) -> bool {
        self.flags.contains(Flags::SORTED_DIRS)
    }

    /// The image holds nothing but a superblock
    pub fn is_empty(&self) -> bool {
        self.root.offset() == 0
    }
}

fn read_raw(accessor: &dyn Accessor, offset: u32) -> Result<repr::superblock::Superblock> {
    let view = accessor.read(offset, SIZE)?;
    let raw = repr::superblock::Superblock::read_from(&*view).context(OutOfBounds {
        offset,
        len: SIZE,
        limit: view.len() as u64,
    })?;
    Ok(raw)
}

/// Locate and validate the superblock
///
/// The magic is looked for at offset 0, then at offset 512. Unknown feature flags, a root
/// which is not a directory, or (unless the image says its root is moved) a root whose
/// entries don't directly follow the superblock all fail the mount.
pub fn parse(accessor: &dyn Accessor, logger: &Logger) -> Result<Superblock> {
    let mut base = 0;
    let mut raw = read_raw(accessor, base)?;
    if !raw.has_magic() {
        slog::info!(logger, "No magic at offset 0, trying {}", BOOT_SECTOR_SIZE);
        let first_magic = raw.magic.get();
        base = BOOT_SECTOR_SIZE;
        raw = match read_raw(accessor, base) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::Corrupt => {
                return BadMagic { magic: first_magic }.fail().map_err(Into::into);
            }
            Err(e) => return Err(e),
        };
        ensure!(
            raw.has_magic(),
            BadMagic {
                magic: raw.magic.get()
            }
        );
    }

    ensure!(
        raw.unsupported_flags() == 0,
        UnsupportedFeatures {
            flags: raw.unsupported_flags()
        }
    );
    let flags = raw.known_flags();

    let root = raw.root;
    ensure!(
        root.mode().is_dir(),
        RootNotDirectory {
            mode: root.mode().bits()
        }
    );

    let root_offset = root.offset();
    if root_offset == 0 {
        slog::info!(logger, "Empty filesystem");
    } else if !flags.contains(Flags::SHIFTED_ROOT_OFFSET) {
        let expected = base + SIZE as u32;
        ensure!(
            root_offset == expected,
            BadRootOffset {
                offset: root_offset,
                expected,
            }
        );
    }

    let (size, blocks, files) = if flags.contains(Flags::FSID_VERSION_2) {
        (raw.size.get(), raw.fsid.blocks.get(), raw.fsid.files.get())
    } else {
        (LEGACY_IMAGE_SIZE, 0, 0)
    };

    let superblock = Superblock {
        base,
        flags,
        size,
        blocks,
        files,
        edition: raw.fsid.edition.get(),
        name: raw.name.trim_end_with(|c| c == '\0').into(),
        root,
    };
    log_superblock(logger, &superblock);
    Ok(superblock)
}

fn log_superblock(logger: &Logger, superblock: &Superblock) {
    slog::debug!(logger, "Read superblock";
        "base" => superblock.base,
        "flags" => superblock.flags.bits(),
        "size" => superblock.size,
        "blocks" => superblock.blocks,
        "files" => superblock.files,
        "edition" => superblock.edition,
        "name" => %superblock.name,
        "root" => ?superblock.root
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::Linear;
    use repr::{AsBytes, Mode};
    use slog::Discard;

    fn logger() -> Logger {
        Logger::root(Discard, slog::o!())
    }

    fn superblock(flags: u32, root_offset: u32, root_mode: Mode) -> Vec<u8> {
        let mut sb = repr::superblock::Superblock::new_zeroed();
        sb.magic.set(repr::superblock::MAGIC);
        sb.size.set(4096);
        sb.flags.set(flags);
        sb.signature = repr::superblock::SIGNATURE;
        sb.fsid.blocks.set(3);
        sb.fsid.files.set(2);
        sb.name[..4].copy_from_slice(b"test");
        sb.root = repr::inode::Inode::new(root_mode, 0, 0, 0, 0, root_offset);
        let mut image = sb.as_bytes().to_vec();
        image.resize(4096, 0);
        image
    }

    fn dir() -> Mode {
        Mode::TYPE_DIR | Mode::O755
    }

    #[test]
    fn valid_v2() {
        let image = superblock(1, SIZE as u32, dir());
        let sb = parse(&Linear::new(image), &logger()).unwrap();
        assert_eq!(sb.base, 0);
        assert_eq!(sb.size, 4096);
        assert_eq!(sb.blocks, 3);
        assert_eq!(sb.files, 2);
        assert_eq!(sb.name, "test");
        assert!(!sb.sorted_dirs());
    }

    #[test]
    fn legacy_defaults() {
        let image = superblock(0, SIZE as u32, dir());
        let sb = parse(&Linear::new(image), &logger()).unwrap();
        assert_eq!(sb.size, LEGACY_IMAGE_SIZE);
        assert_eq!(sb.blocks, 0);
        assert_eq!(sb.files, 0);
    }

    #[test]
    fn unknown_flag() {
        let image = superblock(1 | 0x800, SIZE as u32, dir());
        let err = parse(&Linear::new(image), &logger()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn root_must_be_directory() {
        let image = superblock(1, SIZE as u32, Mode::TYPE_FILE | Mode::O644);
        let err = parse(&Linear::new(image), &logger()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupt);
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn root_offset_checked_unless_shifted() {
        let image = superblock(1, 128, dir());
        let err = parse(&Linear::new(image), &logger()).unwrap_err();
        assert!(err.to_string().contains("root offset"));

        let image = superblock(1 | 0x400, 128, dir());
        assert!(parse(&Linear::new(image), &logger()).is_ok());
    }

    #[test]
    fn empty_filesystem() {
        let image = superblock(1, 0, dir());
        let sb = parse(&Linear::new(image), &logger()).unwrap();
        assert!(sb.is_empty());
    }

    #[test]
    fn short_image_without_magic() {
        let err = parse(&Linear::new(vec![0u8; 100]), &logger()).unwrap_err();
        assert!(err.to_string().contains("Magic mismatch"));
    }
}
