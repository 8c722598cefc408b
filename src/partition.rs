//! Read-only flash partitions
//!
//! A flash image is split into named partitions. Each one says how its image is reached,
//! and for the linear modes, where the flash sits in physical memory. Partitions are looked
//! up by minor number: their index in the table.

use positioned_io::{ReadAt, Size};
use slog::Logger;
use snafu::{ensure, OptionExt};
use std::sync::Arc;
use std::{fmt, io};

use crate::accessor::{Accessor, Block, Linear};
use crate::config::{AddressingMode, Options};
use crate::errors::*;
use crate::read::Filesystem;
use crate::PAGE_SIZE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub name: String,
    /// Start of the partition within the flash
    pub offset: u64,
    pub size: u64,
    pub mode: AddressingMode,
    /// Physical address of the start of the flash. Unused in block mode
    pub phys_addr: u64,
}

impl Partition {
    pub fn new<S: Into<String>>(
        name: S,
        offset: u64,
        size: u64,
        mode: AddressingMode,
        phys_addr: u64,
    ) -> Self {
        Self {
            name: name.into(),
            offset,
            size,
            mode,
            phys_addr,
        }
    }

    /// This partition's bytes of `flash`
    pub fn window(&self, flash: Arc<[u8]>) -> Result<Window> {
        let end = self.offset.checked_add(self.size);
        let end = end.filter(|&end| end <= flash.len() as u64).context(BadPartition {
            name: &self.name,
            err: format!(
                "{:#x} bytes at {:#x} extend past the flash ({:#x} bytes)",
                self.size,
                self.offset,
                flash.len()
            ),
        })?;
        Ok(Window {
            flash,
            start: self.offset as usize,
            end: end as usize,
        })
    }

    /// The physical address the partition's image starts at
    pub fn phys_base(&self) -> Option<u64> {
        self.phys_addr.checked_add(self.offset)
    }

    /// Build the accessor this partition's mode calls for, over its window of `flash`
    pub fn open(&self, flash: Arc<[u8]>) -> Result<Box<dyn Accessor>> {
        match self.mode {
            AddressingMode::Char => CharDevice { name: &self.name }.fail().map_err(Into::into),
            mode if mode.is_linear() => {
                let phys = self.phys_base().unwrap_or(0);
                ensure!(
                    phys != 0 && phys % PAGE_SIZE as u64 == 0,
                    BadPhysAddr { addr: phys }
                );
                let window = self.window(flash)?;
                if self.mode == AddressingMode::LinearXip {
                    Ok(Box::new(Linear::xip(window, phys)))
                } else {
                    Ok(Box::new(Linear::with_phys_base(window, phys)))
                }
            }
            _ => {
                let window = self.window(flash)?;
                Ok(Box::new(Block::new(window)?))
            }
        }
    }

    pub fn mount(&self, flash: Arc<[u8]>, options: &Options, logger: Logger) -> Result<Filesystem> {
        let logger = logger.new(slog::o!("partition" => self.name.clone()));
        let accessor = self.open(flash)?;
        Filesystem::mount_with(accessor, options, logger)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PartitionTable {
    partitions: Vec<Partition>,
}

impl PartitionTable {
    pub fn new(partitions: Vec<Partition>) -> Self {
        Self { partitions }
    }

    pub fn push(&mut self, partition: Partition) -> usize {
        self.partitions.push(partition);
        self.partitions.len() - 1
    }

    pub fn get(&self, minor: usize) -> Option<&Partition> {
        self.partitions.get(minor)
    }

    /// The minor number and description of the partition called `name`
    pub fn find(&self, name: &str) -> Option<(usize, &Partition)> {
        self.partitions.iter().enumerate().find(|(_, p)| p.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Partition> {
        self.partitions.iter()
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}

/// One partition's region of a shared flash image
///
/// Reads which run past the end of the region come back short.
#[derive(Clone)]
pub struct Window {
    flash: Arc<[u8]>,
    start: usize,
    end: usize,
}

impl Window {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl AsRef<[u8]> for Window {
    fn as_ref(&self) -> &[u8] {
        &self.flash[self.start..self.end]
    }
}

impl ReadAt for Window {
    fn read_at(&self, pos: u64, buf: &mut [u8]) -> io::Result<usize> {
        let region = self.as_ref();
        if pos >= region.len() as u64 {
            return Ok(0);
        }
        let pos = pos as usize;
        let n = buf.len().min(region.len() - pos);
        buf[..n].copy_from_slice(&region[pos..pos + n]);
        Ok(n)
    }
}

impl Size for Window {
    fn size(&self) -> io::Result<Option<u64>> {
        Ok(Some(self.len() as u64))
    }
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("start", &self.start)
            .field("end", &self.end)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flash() -> Arc<[u8]> {
        (0..16 * PAGE_SIZE).map(|i| (i / PAGE_SIZE) as u8).collect::<Vec<u8>>().into()
    }

    #[test]
    fn window_reads_clamp_to_region() {
        let part = Partition::new("data", 2 * PAGE_SIZE as u64, 10, AddressingMode::Block, 0);
        let window = part.window(flash()).unwrap();
        let mut buf = [0xffu8; 16];
        assert_eq!(window.read_at(4, &mut buf).unwrap(), 6);
        assert_eq!(&buf[..6], &[2; 6]);
        assert_eq!(window.read_at(10, &mut buf).unwrap(), 0);
        assert_eq!(window.size().unwrap(), Some(10));
    }

    #[test]
    fn partition_past_flash_end() {
        let part = Partition::new("big", 0, 17 * PAGE_SIZE as u64, AddressingMode::Block, 0);
        let err = part.window(flash()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn char_is_rejected() {
        let part = Partition::new("tty", 0, PAGE_SIZE as u64, AddressingMode::Char, 0);
        let err = part.open(flash()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn linear_needs_aligned_phys() {
        let size = PAGE_SIZE as u64;
        let zero = Partition::new("root", 0, size, AddressingMode::Linear, 0);
        assert_eq!(zero.open(flash()).unwrap_err().kind(), ErrorKind::Unsupported);

        let unaligned = Partition::new("root", 0x10, size, AddressingMode::Linear, 0x0100_0000);
        assert_eq!(unaligned.open(flash()).unwrap_err().kind(), ErrorKind::Unsupported);

        let offset = 4 * PAGE_SIZE as u64;
        let good = Partition::new("root", offset, size, AddressingMode::LinearXip, 0x0100_0000);
        let accessor = good.open(flash()).unwrap();
        assert_eq!(accessor.mode(), AddressingMode::LinearXip);
        assert!(accessor.supports_xip());
        assert_eq!(accessor.phys_base(), Some(0x0100_0000 + offset));
        assert_eq!(&*accessor.read(0, 2).unwrap(), &[4, 4]);
    }

    #[test]
    fn block_mode_ignores_phys() {
        let size = 2 * PAGE_SIZE as u64;
        let part = Partition::new("lang", PAGE_SIZE as u64, size, AddressingMode::Block, !0);
        let accessor = part.open(flash()).unwrap();
        assert_eq!(accessor.mode(), AddressingMode::Block);
        assert_eq!(accessor.phys_base(), None);
        assert_eq!(&*accessor.read(PAGE_SIZE as u32, 1).unwrap(), &[2]);
    }

    #[test]
    fn table_by_minor() {
        let mut table = PartitionTable::default();
        table.push(Partition::new("root", 0, 1, AddressingMode::Linear, 0x1000));
        let minor = table.push(Partition::new("setup", 1, 1, AddressingMode::Block, 0));
        assert_eq!(minor, 1);
        assert_eq!(table.get(1).unwrap().name, "setup");
        assert_eq!(table.find("root").map(|(minor, _)| minor), Some(0));
        assert!(table.get(2).is_none());
        assert_eq!(table.len(), 2);
    }
}
