use snafu::{IntoError, Snafu};
use std::io;
use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub struct Error(ErrorInner);

/// Broad classes of failure, for callers which need to react differently to each
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The image is malformed
    Corrupt,
    /// The backing store failed to produce data
    Io,
    /// The request itself was invalid, the image may be fine
    InvalidArgument,
    /// The image or mount configuration uses something this reader can't handle
    Unsupported,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self.0 {
            ErrorInner::BadMagic { .. }
            | ErrorInner::RootNotDirectory { .. }
            | ErrorInner::BadRootOffset { .. }
            | ErrorInner::OutOfBounds { .. }
            | ErrorInner::EmptyName { .. }
            | ErrorInner::BadBlockPointers { .. }
            | ErrorInner::CorruptPage { .. } => ErrorKind::Corrupt,
            ErrorInner::Io { .. } | ErrorInner::UnableToOpen { .. } => ErrorKind::Io,
            ErrorInner::UnalignedCursor { .. }
            | ErrorInner::NotDirectory { .. }
            | ErrorInner::NotReadable { .. }
            | ErrorInner::NotXip { .. }
            | ErrorInner::SpanTooLarge { .. }
            | ErrorInner::BadPageBuffer { .. }
            | ErrorInner::BadPartition { .. } => ErrorKind::InvalidArgument,
            ErrorInner::UnsupportedFeatures { .. }
            | ErrorInner::CharDevice { .. }
            | ErrorInner::BadPhysAddr { .. } => ErrorKind::Unsupported,
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum ErrorInner {
    #[snafu(display(
        "Magic mismatch: expected {:#x}, got {:#x}",
        repr::superblock::MAGIC,
        magic
    ))]
    BadMagic { magic: u32 },
    #[snafu(display("Unsupported filesystem features: {:#x}", flags))]
    UnsupportedFeatures { flags: u32 },
    #[snafu(display("Root is not a directory (mode {:#o})", mode))]
    RootNotDirectory { mode: u16 },
    #[snafu(display("Bad root offset {}, expected {}", offset, expected))]
    BadRootOffset { offset: u32, expected: u32 },
    #[snafu(display("Partition {} is a character device and can't be mounted", name))]
    CharDevice { name: String },
    #[snafu(display("Physical address {:#x} for a linear image must be non-zero and page aligned", addr))]
    BadPhysAddr { addr: u64 },
    #[snafu(display("Invalid partition {}: {}", name, err))]
    BadPartition { name: String, err: String },
    #[snafu(display(
        "Read of {} bytes at offset {:#x} is outside the image ({} bytes)",
        len,
        offset,
        limit
    ))]
    OutOfBounds { offset: u64, len: usize, limit: u64 },
    #[snafu(display("Read of {} bytes at offset {:#x} does not fit in a read buffer", len, offset))]
    SpanTooLarge { offset: u32, len: usize },
    #[snafu(display("Page buffer is {} bytes, expected {}", len, expected))]
    BadPageBuffer { len: usize, expected: usize },
    #[snafu(display("Directory entry at offset {:#x} has an empty name", offset))]
    EmptyName { offset: u32 },
    #[snafu(display("Bad block pointers for page {}: start {:#x}, end {:#x}", page, start, end))]
    BadBlockPointers { page: u32, start: u32, end: u32 },
    #[snafu(display("Unable to decompress page {}: {}", page, source))]
    CorruptPage { page: u32, source: io::Error },
    #[snafu(display("Directory offset {} is not 4 byte aligned", offset))]
    UnalignedCursor { offset: u32 },
    #[snafu(display("Inode {} is not a directory", ino))]
    NotDirectory { ino: u32 },
    #[snafu(display("Inode {} has no data pages", ino))]
    NotReadable { ino: u32 },
    #[snafu(display("Inode {} can't be mapped in place", ino))]
    NotXip { ino: u32 },
    #[snafu(display("Unable to open {}: {}", path.display(), source))]
    UnableToOpen { path: PathBuf, source: io::Error },
    #[snafu(display("IO error: {}", source))]
    Io { source: io::Error },
}

impl From<io::Error> for ErrorInner {
    fn from(e: io::Error) -> Self {
        Io.into_error(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error(e.into())
    }
}
