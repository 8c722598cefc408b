//! A reader for cramfs, the compressed read-only filesystem
//!
//! An image is reached through an [`Accessor`](accessor/trait.Accessor.html): either a memory
//! mapping ([`Linear`](accessor/struct.Linear.html)) or a block device behind a small buffer
//! cache ([`Block`](accessor/struct.Block.html)). [`Filesystem::mount`](struct.Filesystem.html#method.mount)
//! validates the superblock, after which directories can be listed and searched, and file
//! pages decompressed, from any number of threads.

pub mod accessor;
pub mod compression;
pub mod config;
pub mod dir;
mod errors;
pub mod inode;
pub mod partition;
mod read;
pub mod superblock;

pub use accessor::{Accessor, Block, Linear, View};
pub use config::{AddressingMode, Options};
pub use dir::{DirEntry, ReadDir};
pub use errors::{Error, ErrorKind, Result};
pub use inode::{FileType, Inode};
pub use partition::{Partition, PartitionTable};
pub use read::{Filesystem, StatFs, XipMapping, MAX_COMPRESSED_PAGE};
pub use repr::{Mode, PAGE_SHIFT, PAGE_SIZE};
