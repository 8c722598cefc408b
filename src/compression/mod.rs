//! Page compression
//!
//! cramfs only ever stores zlib streams, one per page. The traits mirror the split between
//! compressing (used when packing images) and decompressing (used when reading pages).

use std::io;

pub mod zlib;

pub use zlib::Zlib;

pub trait Compressor {
    /// Compress all of `src` into `dst`, returning the compressed size
    fn compress(&mut self, src: &[u8], dst: &mut [u8]) -> io::Result<usize>;
}

pub trait Decompressor {
    /// Decompress a complete stream from `src` into `dst`, returning the decompressed size
    ///
    /// Output which would not fit in `dst` is an error of kind `InvalidData`.
    fn decompress(&mut self, src: &[u8], dst: &mut [u8]) -> io::Result<usize>;
}
