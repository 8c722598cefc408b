use bstr::BString;
use byteorder::{ByteOrder, LittleEndian};
use parking_lot::Mutex;
use positioned_io::RandomAccessFile;
use slog::{Drain, Logger};
use snafu::{ensure, OptionExt, ResultExt};
use std::path::Path;
use std::sync::Arc;

use crate::accessor::{Accessor, Block, View};
use crate::compression::{Decompressor, Zlib};
use crate::config::{AddressingMode, Options};
use crate::dir::{self, ReadDir};
use crate::errors::*;
use crate::inode::Inode;
use crate::superblock::{self, Superblock};
use crate::{PAGE_SHIFT, PAGE_SIZE};

/// A page compresses to at most this many bytes. Anything longer is a corrupt pointer table
pub const MAX_COMPRESSED_PAGE: u32 = 2 * PAGE_SIZE as u32;

/// A mounted cramfs image
///
/// Cloning is cheap, and clones share the backing store, its cache, and the decompressor.
/// Every operation may be called from any number of threads at once.
#[derive(Debug, Clone)]
pub struct Filesystem {
    inner: Arc<Inner>,
}

#[derive(Debug)]
pub(crate) struct Inner {
    accessor: Box<dyn Accessor>,
    superblock: Superblock,
    root: Inode,
    decompressor: Mutex<Zlib>,
    options: Options,
    logger: Logger,
}

static_assertions::assert_impl_all!(Filesystem: Send, Sync, Clone);

pub(crate) fn default_logger() -> Logger {
    slog::Logger::root(slog_stdlog::StdLog.fuse(), slog::o!())
}

/// Statistics as reported by `statfs`
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StatFs {
    pub fs_type: u32,
    pub block_size: u32,
    pub blocks: u64,
    pub blocks_free: u64,
    pub blocks_available: u64,
    pub files: u64,
    pub files_free: u64,
    pub name_len: u32,
}

/// Where an execute-in-place file range lives in physical memory
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct XipMapping {
    pub phys_addr: u64,
    pub len: u64,
}

fn page_align(offset: u64) -> u64 {
    (offset + PAGE_SIZE as u64 - 1) & !(PAGE_SIZE as u64 - 1)
}

fn add_offset(base: u32, add: u64, len: usize) -> Result<u32> {
    let offset = u64::from(base) + add;
    if offset > u64::from(u32::MAX) {
        return OutOfBounds {
            offset,
            len,
            limit: u64::from(u32::MAX),
        }
        .fail()
        .map_err(Into::into);
    }
    Ok(offset as u32)
}

impl Filesystem {
    /// Mount an image file, read through the block buffer cache
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_logger(path, default_logger())
    }

    pub fn open_with_logger<P: AsRef<Path>>(path: P, logger: Logger) -> Result<Self> {
        Self::_open_with_logger(path.as_ref(), logger)
    }

    fn _open_with_logger(path: &Path, logger: Logger) -> Result<Self> {
        let path_str = path.display().to_string();
        let logger = logger.new(slog::o!("file" => path_str));
        let file = RandomAccessFile::open(path).context(UnableToOpen { path })?;
        let block = Block::with_logger(file, logger.clone()).context(UnableToOpen { path })?;
        Self::mount_with(block, &Options::default(), logger)
    }

    pub fn mount<A: Accessor + 'static>(accessor: A) -> Result<Self> {
        Self::mount_with(accessor, &Options::default(), default_logger())
    }

    pub fn mount_with_logger<A: Accessor + 'static>(accessor: A, logger: Logger) -> Result<Self> {
        Self::mount_with(accessor, &Options::default(), logger)
    }

    /// Validate the superblock and build the root inode
    ///
    /// On failure the accessor is dropped, releasing whatever it maps.
    pub fn mount_with<A: Accessor + 'static>(
        accessor: A,
        options: &Options,
        logger: Logger,
    ) -> Result<Self> {
        let mode = accessor.mode();
        let logger = logger.new(slog::o!("mode" => mode.name()));
        ensure!(
            mode != AddressingMode::Char,
            CharDevice {
                name: format!("{:?}", accessor)
            }
        );
        let superblock = superblock::parse(&accessor, &logger)?;
        let root = Inode::from_raw(&superblock.root, options.timestamp);
        slog::info!(logger, "Mounted cramfs";
            "name" => %superblock.name,
            "size" => superblock.size,
            "files" => superblock.files,
            "phys_base" => ?accessor.phys_base()
        );

        Ok(Self {
            inner: Arc::new(Inner {
                accessor: Box::new(accessor),
                superblock,
                root,
                decompressor: Mutex::new(Zlib::new()),
                options: *options,
                logger,
            }),
        })
    }

    pub fn superblock(&self) -> &Superblock {
        &self.inner.superblock
    }

    pub fn mode(&self) -> AddressingMode {
        self.inner.accessor.mode()
    }

    pub fn root(&self) -> Inode {
        self.inner.root
    }

    pub fn statfs(&self) -> StatFs {
        let superblock = &self.inner.superblock;
        StatFs {
            fs_type: repr::superblock::MAGIC,
            block_size: PAGE_SIZE as u32,
            blocks: u64::from(superblock.blocks),
            blocks_free: 0,
            blocks_available: 0,
            files: u64::from(superblock.files),
            files_free: 0,
            name_len: 255,
        }
    }

    /// Find the entry called `name` in the directory `dir`
    ///
    /// A missing name is `Ok(None)`, not an error.
    pub fn lookup<N: AsRef<[u8]>>(&self, dir: &Inode, name: N) -> Result<Option<Inode>> {
        dir::lookup(&self.inner, dir, name.as_ref())
    }

    /// List `dir`, starting at `cursor` bytes into its entries
    ///
    /// Pass an entry's [`next_offset`](dir/struct.DirEntry.html#method.next_offset) to resume
    /// after it. A cursor at or past the end lists nothing.
    pub fn readdir(&self, dir: &Inode, cursor: u32) -> Result<ReadDir<'_>> {
        ReadDir::new(&self.inner, dir, cursor)
    }

    /// Resolve a `/` separated path from the root
    ///
    /// `.` components are skipped, `..` goes back up (and stays at the root).
    pub fn resolve<P: AsRef<[u8]>>(&self, path: P) -> Result<Option<Inode>> {
        let mut stack = vec![self.inner.root];
        for component in path.as_ref().split(|&b| b == b'/') {
            match component {
                b"" | b"." => {}
                b".." => {
                    if stack.len() > 1 {
                        stack.pop();
                    }
                }
                name => {
                    let dir = stack[stack.len() - 1];
                    match self.lookup(&dir, name)? {
                        Some(inode) => stack.push(inode),
                        None => return Ok(None),
                    }
                }
            }
        }
        Ok(stack.pop())
    }

    /// Read page `index` of a file or symlink
    pub fn read_page(&self, inode: &Inode, index: u32) -> Result<Vec<u8>> {
        let mut page = vec![0; PAGE_SIZE];
        self.read_page_into(inode, index, &mut page)?;
        Ok(page)
    }

    /// Fill `page`, which must be [`PAGE_SIZE`](constant.PAGE_SIZE.html) long, with page `index`
    ///
    /// Bytes past the end of the file are zero, as is the whole of a page beyond it or in a
    /// hole. A page which fails to decompress is an error for that page only.
    pub fn read_page_into(&self, inode: &Inode, index: u32, page: &mut [u8]) -> Result<()> {
        ensure!(
            page.len() == PAGE_SIZE,
            BadPageBuffer {
                len: page.len(),
                expected: PAGE_SIZE,
            }
        );
        ensure!(
            inode.is_file() || inode.is_symlink(),
            NotReadable { ino: inode.ino() }
        );
        let filled = if index >= inode.page_count() {
            0
        } else if inode.is_xip() && self.inner.accessor.supports_xip() {
            self.inner.read_xip_page(inode, index, page)?
        } else {
            self.inner.read_compressed_page(inode, index, page)?
        };
        for byte in &mut page[filled..] {
            *byte = 0;
        }
        Ok(())
    }

    /// Read file content at byte position `pos`, returning how many bytes were read
    ///
    /// Returns 0 at or past the end of the file.
    pub fn read_at(&self, inode: &Inode, pos: u64, buf: &mut [u8]) -> Result<usize> {
        ensure!(
            inode.is_file() || inode.is_symlink(),
            NotReadable { ino: inode.ino() }
        );
        let size = u64::from(inode.size());
        if pos >= size || buf.is_empty() {
            return Ok(0);
        }
        let end = size.min(pos + buf.len() as u64);

        let mut page = vec![0; PAGE_SIZE];
        let mut current = pos;
        while current < end {
            let index = (current >> PAGE_SHIFT) as u32;
            let in_page = (current % PAGE_SIZE as u64) as usize;
            self.read_page_into(inode, index, &mut page)?;
            let n = ((PAGE_SIZE - in_page) as u64).min(end - current) as usize;
            let done = (current - pos) as usize;
            buf[done..done + n].copy_from_slice(&page[in_page..in_page + n]);
            current += n as u64;
        }
        Ok((end - pos) as usize)
    }

    /// The target of a symlink
    pub fn read_link(&self, inode: &Inode) -> Result<BString> {
        ensure!(inode.is_symlink(), NotReadable { ino: inode.ino() });
        let mut target = vec![0; inode.size() as usize];
        let len = self.read_at(inode, 0, &mut target)?;
        target.truncate(len);
        Ok(target.into())
    }

    /// The physical range backing `length` bytes of an execute-in-place file, starting
    /// `page_offset` pages in
    ///
    /// The length is clamped to the file size and rounded up to whole pages.
    pub fn xip_mapping(&self, inode: &Inode, page_offset: u32, length: u64) -> Result<XipMapping> {
        let accessor = &self.inner.accessor;
        ensure!(
            inode.is_xip() && accessor.supports_xip(),
            NotXip { ino: inode.ino() }
        );
        let phys_base = accessor.phys_base().context(NotXip { ino: inode.ino() })?;
        let start = page_align(phys_base + u64::from(inode.offset()));
        let len = page_align(length.min(u64::from(inode.size())));
        Ok(XipMapping {
            phys_addr: start + (u64::from(page_offset) << PAGE_SHIFT),
            len,
        })
    }
}

impl Inner {
    /// Borrow part of the image, refusing anything outside the image's declared size
    pub(crate) fn read(&self, offset: u32, len: usize) -> Result<View<'_>> {
        let limit = u64::from(self.superblock.size);
        ensure!(
            u64::from(offset) + len as u64 <= limit,
            OutOfBounds {
                offset,
                len,
                limit,
            }
        );
        self.accessor.read(offset, len)
    }

    pub(crate) fn sorted_dirs(&self) -> bool {
        self.superblock.sorted_dirs()
    }

    pub(crate) fn options(&self) -> &Options {
        &self.options
    }

    fn read_u32(&self, offset: u32) -> Result<u32> {
        let view = self.read(offset, 4)?;
        Ok(LittleEndian::read_u32(&view))
    }

    /// Execute-in-place files are stored as whole, uncompressed pages from the first page
    /// boundary at or after their offset
    fn read_xip_page(&self, inode: &Inode, index: u32, page: &mut [u8]) -> Result<usize> {
        let start = page_align(u64::from(inode.offset())) + (u64::from(index) << PAGE_SHIFT);
        let start = add_offset(0, start, PAGE_SIZE)?;
        let view = self.read(start, PAGE_SIZE)?;
        page.copy_from_slice(&view);
        Ok(PAGE_SIZE)
    }

    /// Find the page's span from the block pointer table, then inflate it
    fn read_compressed_page(&self, inode: &Inode, index: u32, page: &mut [u8]) -> Result<usize> {
        let table = inode.offset();
        let pointer = add_offset(table, u64::from(index) * 4, 4)?;
        let start = if index == 0 {
            add_offset(table, u64::from(inode.page_count()) * 4, 0)?
        } else {
            self.read_u32(pointer - 4)?
        };
        let end = self.read_u32(pointer)?;

        if end < start || end - start > MAX_COMPRESSED_PAGE {
            slog::warn!(self.logger, "Corrupt block pointers";
                "ino" => inode.ino(), "page" => index, "start" => start, "end" => end);
            return BadBlockPointers {
                page: index,
                start,
                end,
            }
            .fail()
            .map_err(Into::into);
        }
        if start == end {
            slog::trace!(self.logger, "Hole"; "ino" => inode.ino(), "page" => index);
            return Ok(0);
        }

        let compressed = self.read(start, (end - start) as usize)?;
        let result = self.decompressor.lock().decompress(&compressed, page);
        drop(compressed);
        match result {
            Ok(len) => Ok(len),
            Err(e) => {
                slog::warn!(self.logger, "Page decompression failed";
                    "ino" => inode.ino(), "page" => index, "error" => %e);
                Err(e).context(CorruptPage { page: index }).map_err(Into::into)
            }
        }
    }
}
