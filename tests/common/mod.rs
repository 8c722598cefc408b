//! A small image packer, enough to build the images the tests read
#![allow(dead_code)]

use cramfs::compression::{Compressor, Zlib};
use cramfs::{Mode, PAGE_SIZE};
use repr::superblock::{self, Flags};
use repr::{AsBytes, FromBytes};
use std::collections::VecDeque;

pub enum Kind {
    File(Vec<u8>),
    Xip(Vec<u8>),
    Symlink(Vec<u8>),
    Dir(Vec<Entry>),
    Device(u32),
}

pub struct Entry {
    pub name: Vec<u8>,
    pub kind: Kind,
    pub mode: Mode,
    pub uid: u16,
    pub gid: u8,
}

impl Entry {
    fn new(name: &[u8], kind: Kind, mode: Mode) -> Self {
        Self {
            name: name.to_vec(),
            kind,
            mode,
            uid: 0,
            gid: 0,
        }
    }

    pub fn owner(mut self, uid: u16, gid: u8) -> Self {
        self.uid = uid;
        self.gid = gid;
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }
}

pub fn file(name: &str, data: &[u8]) -> Entry {
    Entry::new(name.as_bytes(), Kind::File(data.to_vec()), Mode::TYPE_FILE | Mode::O644)
}

pub fn xip_file(name: &str, data: &[u8]) -> Entry {
    let mode = Mode::TYPE_FILE | Mode::BIT_STICKY | Mode::O755;
    Entry::new(name.as_bytes(), Kind::Xip(data.to_vec()), mode)
}

pub fn dir(name: &str, children: Vec<Entry>) -> Entry {
    Entry::new(name.as_bytes(), Kind::Dir(children), Mode::TYPE_DIR | Mode::O755)
}

pub fn symlink(name: &str, target: &str) -> Entry {
    let mode = Mode::TYPE_LINK | Mode::from_bits_truncate(0o777);
    Entry::new(name.as_bytes(), Kind::Symlink(target.as_bytes().to_vec()), mode)
}

pub fn char_device(name: &str, rdev: u32) -> Entry {
    Entry::new(name.as_bytes(), Kind::Device(rdev), Mode::TYPE_CHAR | Mode::O644)
}

/// An entry with an arbitrary raw name, for building broken directories
pub fn raw_named(name: &[u8], data: &[u8]) -> Entry {
    Entry::new(name, Kind::File(data.to_vec()), Mode::TYPE_FILE | Mode::O644)
}

pub fn compress(page: &[u8]) -> Vec<u8> {
    let mut out = vec![0; 2 * PAGE_SIZE];
    let len = Zlib::new().compress(page, &mut out).unwrap();
    out.truncate(len);
    out
}

fn pad4(n: usize) -> usize {
    (n + 3) & !3
}

fn page_align(n: usize) -> usize {
    (n + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

fn dir_bytes(children: &[Entry]) -> usize {
    children.iter().map(|e| 12 + pad4(e.name.len())).sum()
}

fn total_dir_bytes(children: &[Entry]) -> usize {
    let nested: usize = children
        .iter()
        .map(|e| match &e.kind {
            Kind::Dir(c) => total_dir_bytes(c),
            _ => 0,
        })
        .sum();
    dir_bytes(children) + nested
}

fn sort(children: &mut Vec<Entry>) {
    children.sort_by(|a, b| a.name.cmp(&b.name));
    for child in children {
        if let Kind::Dir(c) = &mut child.kind {
            sort(c);
        }
    }
}

fn put(out: &mut Vec<u8>, at: usize, bytes: &[u8]) {
    if out.len() < at + bytes.len() {
        out.resize(at + bytes.len(), 0);
    }
    out[at..at + bytes.len()].copy_from_slice(bytes);
}

pub struct Builder {
    root: Vec<Entry>,
    sorted: bool,
    version2: bool,
    holes: bool,
    boot_sector: bool,
    extra_flags: u32,
    name: String,
}

impl Builder {
    pub fn new(root: Vec<Entry>) -> Self {
        Self {
            root,
            sorted: true,
            version2: true,
            holes: false,
            boot_sector: false,
            extra_flags: 0,
            name: "Compressed".to_string(),
        }
    }

    /// Sort entries by name and set the sorted flag (the default)
    pub fn sorted(mut self, sorted: bool) -> Self {
        self.sorted = sorted;
        self
    }

    pub fn legacy(mut self) -> Self {
        self.version2 = false;
        self
    }

    /// Store all zero pages as holes
    pub fn holes(mut self) -> Self {
        self.holes = true;
        self
    }

    pub fn boot_sector(mut self) -> Self {
        self.boot_sector = true;
        self
    }

    pub fn extra_flags(mut self, flags: u32) -> Self {
        self.extra_flags = flags;
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        if self.sorted {
            sort(&mut self.root);
        }
        let base = if self.boot_sector { 512 } else { 0 };
        let mut out = vec![0u8; base + superblock::SIZE];
        let mut files = 1;
        let mut blocks = 0;

        let root_offset = if self.root.is_empty() {
            0
        } else {
            base + superblock::SIZE
        };
        let mut dir_cursor = root_offset + dir_bytes(&self.root);
        let mut data_cursor = root_offset + total_dir_bytes(&self.root);

        let mut queue = VecDeque::new();
        queue.push_back((&self.root[..], root_offset));
        while let Some((children, mut at)) = queue.pop_front() {
            for child in children {
                files += 1;
                let (size, offset) = match &child.kind {
                    Kind::Dir(c) if c.is_empty() => (0, 0),
                    Kind::Dir(c) => {
                        let offset = dir_cursor;
                        dir_cursor += dir_bytes(c);
                        queue.push_back((&c[..], offset));
                        (dir_bytes(c), offset)
                    }
                    Kind::File(data) | Kind::Symlink(data) if data.is_empty() => (0, 0),
                    Kind::File(data) | Kind::Symlink(data) => {
                        let offset = data_cursor;
                        data_cursor = self.write_compressed(&mut out, offset, data, &mut blocks);
                        (data.len(), offset)
                    }
                    Kind::Xip(data) => {
                        let offset = data_cursor;
                        let start = page_align(offset);
                        let len = page_align(data.len());
                        put(&mut out, start, data);
                        put(&mut out, start + data.len(), &vec![0; len - data.len()]);
                        blocks += len / PAGE_SIZE;
                        data_cursor = start + len;
                        (data.len(), offset)
                    }
                    Kind::Device(rdev) => (*rdev as usize, 0),
                };
                let name_len = pad4(child.name.len());
                let raw = repr::inode::Inode::new(
                    child.mode,
                    child.uid,
                    size as u32,
                    child.gid,
                    name_len,
                    offset as u32,
                );
                put(&mut out, at, raw.as_bytes());
                let mut name = child.name.clone();
                name.resize(name_len, 0);
                put(&mut out, at + 12, &name);
                at += 12 + name_len;
            }
        }

        let len = page_align(out.len().max(data_cursor));
        out.resize(len, 0);

        let mut flags = self.extra_flags;
        if self.version2 {
            flags |= Flags::FSID_VERSION_2.bits();
        }
        if self.sorted {
            flags |= Flags::SORTED_DIRS.bits();
        }
        if self.holes {
            flags |= Flags::HOLES.bits();
        }
        let mut sb = superblock::Superblock::new_zeroed();
        sb.magic.set(superblock::MAGIC);
        sb.size.set(len as u32);
        sb.flags.set(flags);
        sb.signature = superblock::SIGNATURE;
        sb.fsid.blocks.set(blocks as u32);
        sb.fsid.files.set(files);
        sb.name[..self.name.len()].copy_from_slice(self.name.as_bytes());
        sb.root = repr::inode::Inode::new(
            Mode::TYPE_DIR | Mode::O755,
            0,
            dir_bytes(&self.root) as u32,
            0,
            0,
            root_offset as u32,
        );
        put(&mut out, base, sb.as_bytes());
        out
    }

    /// A block pointer table followed by the compressed pages. Returns the next free offset
    fn write_compressed(&self, out: &mut Vec<u8>, at: usize, data: &[u8], blocks: &mut usize) -> usize {
        let pages = (data.len() + PAGE_SIZE - 1) / PAGE_SIZE;
        let mut pos = at + pages * 4;
        for (i, page) in data.chunks(PAGE_SIZE).enumerate() {
            if !(self.holes && page.iter().all(|&b| b == 0)) {
                let compressed = compress(page);
                put(out, pos, &compressed);
                pos += compressed.len();
            }
            put(out, at + i * 4, &(pos as u32).to_le_bytes());
            *blocks += 1;
        }
        pad4(pos)
    }
}

/// The `[start, end)` span of page `index` of a file whose pointer table is at `table`
pub fn page_span(image: &[u8], table: u32, pages: u32, index: u32) -> (usize, usize) {
    let word = |at: usize| u32::from_le_bytes([image[at], image[at + 1], image[at + 2], image[at + 3]]);
    let table = table as usize;
    let start = if index == 0 {
        table + pages as usize * 4
    } else {
        word(table + (index as usize - 1) * 4) as usize
    };
    (start, word(table + index as usize * 4) as usize)
}

/// Not compressible, so each page's span is about a page long
pub fn noise(len: usize) -> Vec<u8> {
    let mut state = 0x2545_f491u32;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}

pub fn logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}
