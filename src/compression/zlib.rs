use flate2::{FlushCompress, FlushDecompress};
use std::io;

/// A reusable zlib codec. Both halves are reset before every call, so one instance can serve
/// any number of independent pages
#[derive(Debug)]
pub struct Zlib {
    decompressor: flate2::Decompress,
    compressor: flate2::Compress,
}

impl Default for Zlib {
    fn default() -> Self {
        Self::with_level(flate2::Compression::best())
    }
}

impl Zlib {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(level: flate2::Compression) -> Self {
        Self {
            decompressor: flate2::Decompress::new(true),
            compressor: flate2::Compress::new(level, true),
        }
    }

    fn decompressor(&mut self) -> &mut flate2::Decompress {
        let decompressor = &mut self.decompressor;
        decompressor.reset(true);
        decompressor
    }

    fn compressor(&mut self) -> &mut flate2::Compress {
        let compressor = &mut self.compressor;
        compressor.reset();
        compressor
    }
}

impl super::Compressor for Zlib {
    fn compress(&mut self, src: &[u8], dst: &mut [u8]) -> io::Result<usize> {
        let compressor = self.compressor();
        loop {
            let in_offset = min_mem(compressor.total_in(), src.len());
            let input = &src[in_offset..];

            let out_offset = min_mem(compressor.total_out(), dst.len());
            let output = &mut dst[out_offset..];

            let status = compressor.compress(input, output, FlushCompress::Finish)?;
            match status {
                flate2::Status::Ok if !output.is_empty() => continue,
                flate2::Status::Ok | flate2::Status::BufError => {
                    return Err(io::ErrorKind::UnexpectedEof.into())
                }
                flate2::Status::StreamEnd => break,
            }
        }
        Ok(compressor.total_out() as usize)
    }
}

impl super::Decompressor for Zlib {
    fn decompress(&mut self, src: &[u8], dst: &mut [u8]) -> io::Result<usize> {
        let decompressor = self.decompressor();
        loop {
            let in_offset = min_mem(decompressor.total_in(), src.len());
            let input = &src[in_offset..];

            let out_offset = min_mem(decompressor.total_out(), dst.len());
            let output = &mut dst[out_offset..];
            let output_full = output.is_empty();

            let status = decompressor
                .decompress(input, output, FlushDecompress::Finish)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            match status {
                flate2::Status::StreamEnd => break,
                flate2::Status::Ok | flate2::Status::BufError if output_full => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("decompressed data exceeds {} bytes", dst.len()),
                    ));
                }
                flate2::Status::Ok => continue,
                flate2::Status::BufError => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "truncated compressed stream",
                    ))
                }
            }
        }
        Ok(decompressor.total_out() as usize)
    }
}

fn min_mem(stream_size: u64, mem_size: usize) -> usize {
    if stream_size < mem_size as u64 {
        stream_size as usize
    } else {
        mem_size
    }
}
