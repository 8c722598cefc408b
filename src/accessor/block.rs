use parking_lot::{Mutex, MutexGuard};
use positioned_io::{ReadAt, Size};
use slog::Logger;
use snafu::ensure;
use std::{fmt, io};

use super::{Accessor, View};
use crate::config::AddressingMode;
use crate::errors::*;
use crate::read::default_logger;
use crate::{PAGE_SHIFT, PAGE_SIZE};

/// The number of rotating read buffers
pub const READ_BUFFERS: usize = 2;

/// At least 2, so that a compressed page which grew past a page and starts at an unlucky
/// alignment still fits in one buffer
pub const BLOCKS_PER_BUFFER_SHIFT: u32 = 2;
pub const BLOCKS_PER_BUFFER: usize = 1 << BLOCKS_PER_BUFFER_SHIFT;
pub const BUFFER_SIZE: usize = BLOCKS_PER_BUFFER * PAGE_SIZE;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

struct Buffer {
    /// The first device block held, `None` until filled
    first_block: Option<u32>,
    data: Box<[u8]>,
}

impl Buffer {
    fn new() -> Self {
        Self {
            first_block: None,
            data: vec![0; BUFFER_SIZE].into_boxed_slice(),
        }
    }

    /// Where in this buffer `len` bytes at `in_block` of `block` start, if they are all held
    fn position(&self, block: u32, in_block: usize, len: usize) -> Option<usize> {
        let first = self.first_block?;
        if block < first {
            return None;
        }
        let start = ((block - first) as usize)
            .checked_mul(PAGE_SIZE)?
            .checked_add(in_block)?;
        if start + len > BUFFER_SIZE {
            return None;
        }
        Some(start)
    }
}

struct Buffers {
    slots: [Buffer; READ_BUFFERS],
    next: usize,
    stats: CacheStats,
}

impl Buffers {
    fn new() -> Self {
        Self {
            slots: [Buffer::new(), Buffer::new()],
            next: 0,
            stats: CacheStats::default(),
        }
    }

    fn find(&self, block: u32, in_block: usize, len: usize) -> Option<(usize, usize)> {
        self.slots
            .iter()
            .enumerate()
            .find_map(|(i, buffer)| Some((i, buffer.position(block, in_block, len)?)))
    }

    /// Round robin over the slots
    fn evict(&mut self) -> usize {
        let victim = self.next;
        self.next = (victim + 1) % READ_BUFFERS;
        self.slots[victim].first_block = None;
        victim
    }
}

/// An image read from a block device through a small cache of rotating buffers
///
/// Every miss reads [`BLOCKS_PER_BUFFER`](constant.BLOCKS_PER_BUFFER.html) whole pages,
/// starting at the page holding the requested offset, so nearby reads which follow are
/// served without I/O. Pages past the end of the device read as zeros.
pub struct Block<D> {
    device: D,
    device_len: Option<u64>,
    buffers: Mutex<Buffers>,
    logger: Logger,
}

impl<D: ReadAt + Size> Block<D> {
    pub fn new(device: D) -> io::Result<Self> {
        Self::with_logger(device, default_logger())
    }

    pub fn with_logger(device: D, logger: Logger) -> io::Result<Self> {
        let device_len = device.size()?;
        let logger = logger.new(slog::o!("device_len" => format!("{:?}", device_len)));
        Ok(Self {
            device,
            device_len,
            buffers: Mutex::new(Buffers::new()),
            logger,
        })
    }

    pub fn stats(&self) -> CacheStats {
        self.buffers.lock().stats
    }

    pub fn get_ref(&self) -> &D {
        &self.device
    }

    fn fill(&self, data: &mut [u8], first_block: u32) -> io::Result<()> {
        for (i, chunk) in data.chunks_mut(PAGE_SIZE).enumerate() {
            let pos = (u64::from(first_block) + i as u64) << PAGE_SHIFT;
            let available = match self.device_len {
                Some(len) => len.saturating_sub(pos).min(PAGE_SIZE as u64) as usize,
                None => PAGE_SIZE,
            };
            if available > 0 {
                self.device.read_exact_at(pos, &mut chunk[..available])?;
            }
            for byte in &mut chunk[available..] {
                *byte = 0;
            }
        }
        Ok(())
    }
}

impl<D> Accessor for Block<D>
where
    D: ReadAt + Size + Send + Sync,
{
    fn read(&self, offset: u32, len: usize) -> Result<View<'_>> {
        if len == 0 {
            return Ok(View::empty());
        }
        let block = offset >> PAGE_SHIFT;
        let in_block = offset as usize & (PAGE_SIZE - 1);
        ensure!(in_block + len <= BUFFER_SIZE, SpanTooLarge { offset, len });

        let mut buffers = self.buffers.lock();
        let (slot, start) = match buffers.find(block, in_block, len) {
            Some(found) => {
                buffers.stats.hits += 1;
                found
            }
            None => {
                buffers.stats.misses += 1;
                let slot = buffers.evict();
                slog::trace!(self.logger, "Read buffer miss"; "block" => block, "slot" => slot);
                let buffer = &mut buffers.slots[slot];
                if let Err(e) = self.fill(&mut buffer.data, block) {
                    slog::warn!(self.logger, "Block read failed"; "block" => block, "error" => %e);
                    return Err(e.into());
                }
                buffer.first_block = Some(block);
                (slot, in_block)
            }
        };
        Ok(View::Buffered(MutexGuard::map(buffers, |buffers| {
            &mut buffers.slots[slot].data[start..start + len]
        })))
    }

    fn mode(&self) -> AddressingMode {
        AddressingMode::Block
    }
}

impl<D> fmt::Debug for Block<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("device_len", &self.device_len)
            .finish()
    }
}
