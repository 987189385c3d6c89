//! Gzip/BGZF plumbing shared by the built-in codecs
//!
//! - Local-file opening with threshold-based memory mapping
//! - Gzip and BGZF sniffing over signature prefixes
//! - Partial inflation of a (possibly truncated) compressed prefix
//! - Transparent decompression of gzip/BGZF input streams
//! - A BGZF writer that compresses blocks in parallel with rayon
//!
//! # BGZF
//!
//! BGZF (Blocked GNU Zip Format) is a series of independent gzip members,
//! each decompressing to at most 64 KB, with a `BC` extra subfield carrying
//! the compressed block size. BAM is always BGZF; VCF is BGZF when
//! compressed.

use crate::error::Result;
use flate2::read::MultiGzDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use memmap2::Mmap;
use rayon::prelude::*;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;

/// Memory-mapped file threshold (50 MB)
///
/// Files below this size are read with buffered I/O; mapping them costs more
/// than it saves.
pub const MMAP_THRESHOLD: u64 = 50 * 1024 * 1024;

/// Number of BGZF blocks compressed in parallel by default
///
/// Memory stays bounded at roughly 8 × 60 KB uncompressed plus the same
/// again compressed, regardless of output size.
pub const PARALLEL_BLOCK_COUNT: usize = 8;

/// Maximum size of one compressed BGZF block.
///
/// Codecs whose signature sits inside the first BGZF block probe this many
/// bytes so the whole block is available for inflation.
pub const BGZF_MAX_BLOCK_SIZE: usize = 64 * 1024;

/// Gzip magic bytes (ID1, ID2)
pub const GZIP_MAGIC: [u8; 2] = [31, 139];

/// BGZF end-of-file marker: an empty block, exactly 28 bytes
pub const BGZF_EOF: [u8; 28] = [
    31, 139, 8, 4, 0, 0, 0, 0, 0, 255, // Header (10 bytes)
    6, 0, 66, 67, 2, 0, 27, 0, // Extra field with BSIZE=27 (8 bytes)
    3, 0, // Empty deflate block (2 bytes)
    0, 0, 0, 0, // CRC32 (4 bytes)
    0, 0, 0, 0, // ISIZE=0 (4 bytes)
];

/// Maximum uncompressed size for a single BGZF block
///
/// The format caps a block at 64 KB; 60 KB leaves headroom for the
/// compressed size to stay under 64 KB as well.
const BGZF_BLOCK_SIZE: usize = 60 * 1024;

/// Open a local file, memory-mapping it when it is at least
/// [`MMAP_THRESHOLD`] bytes.
pub fn open_local_file(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let metadata = std::fs::metadata(path)?;

    if metadata.len() >= MMAP_THRESHOLD {
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only; concurrent truncation of the
        // file by another process is outside what this crate guards against.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Box::new(io::Cursor::new(mmap)))
    } else {
        let file = File::open(path)?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Whether `bytes` starts with the gzip magic
pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[..2] == GZIP_MAGIC
}

/// Whether `bytes` starts with a BGZF block header.
///
/// Checks the gzip magic, deflate method, FEXTRA flag, and the `BC`
/// subfield that BGZF places first in the extra field.
pub fn is_bgzf(bytes: &[u8]) -> bool {
    bytes.len() >= 18
        && is_gzip(bytes)
        && bytes[2] == 8 // CM = deflate
        && bytes[3] & 4 != 0 // FLG.FEXTRA
        && bytes[12] == b'B'
        && bytes[13] == b'C'
        && u16::from_le_bytes([bytes[14], bytes[15]]) == 2
}

/// Inflate up to `max` bytes from a gzip/BGZF prefix.
///
/// The prefix is usually truncated mid-stream, so decompression errors after
/// some output are expected; whatever was inflated before the error is
/// returned.
pub fn inflate_prefix(compressed: &[u8], max: usize) -> Vec<u8> {
    let mut decoder = MultiGzDecoder::new(compressed);
    let mut out = vec![0u8; max];
    let mut filled = 0;

    while filled < max {
        match decoder.read(&mut out[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(_) => break,
        }
    }

    out.truncate(filled);
    out
}

/// Wrap `reader` in a gzip decoder when its content starts with the gzip
/// magic; otherwise return it unchanged.
///
/// `MultiGzDecoder` is used so every member of a BGZF file is read, not just
/// the first block.
pub fn decompressed(mut reader: Box<dyn BufRead + Send>) -> Result<Box<dyn BufRead + Send>> {
    let gzipped = is_gzip(reader.fill_buf()?);

    if gzipped {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(reader)
    }
}

/// Parallel BGZF writer
///
/// # Architecture
///
/// 1. Buffer input until `parallel_blocks` blocks of 60 KB are pending
/// 2. Compress the pending blocks in parallel using rayon
/// 3. Write compressed blocks sequentially, each with its BGZF header
/// 4. On [`finish`](BgzfWriter::finish), flush the remainder and (optionally)
///    append the EOF marker
///
/// # Memory
///
/// Bounded by `parallel_blocks × 60 KB` uncompressed plus the same again
/// compressed.
pub struct BgzfWriter<W: Write> {
    /// Underlying writer for compressed output
    writer: W,
    /// Uncompressed blocks waiting to be compressed
    pending: Vec<Vec<u8>>,
    /// Current uncompressed block being filled
    current: Vec<u8>,
    level: Compression,
    parallel_blocks: usize,
    write_eof: bool,
}

impl<W: Write> BgzfWriter<W> {
    /// Create a writer with default settings (level 6, 8 parallel blocks,
    /// EOF marker written)
    pub fn new(writer: W) -> Self {
        Self::with_settings(writer, 6, PARALLEL_BLOCK_COUNT, true)
    }

    /// Create a writer with explicit compression level (0-9), parallel block
    /// count, and EOF marker behaviour
    pub fn with_settings(writer: W, level: u32, parallel_blocks: usize, write_eof: bool) -> Self {
        let parallel_blocks = parallel_blocks.max(1);
        Self {
            writer,
            pending: Vec::with_capacity(parallel_blocks),
            current: Vec::with_capacity(BGZF_BLOCK_SIZE),
            level: Compression::new(level.min(9)),
            parallel_blocks,
            write_eof,
        }
    }

    /// Compress a single block to BGZF format
    ///
    /// # BGZF Block Structure
    ///
    /// Standard gzip header (10 bytes):
    /// - ID1=31, ID2=139 (gzip magic)
    /// - CM=8 (deflate)
    /// - FLG=4 (FEXTRA flag set)
    /// - MTIME=0 (no timestamp)
    /// - XFL=0 (default compression)
    /// - OS=255 (unknown)
    ///
    /// Extra field (8 bytes):
    /// - XLEN=6
    /// - SI1=66 ('B'), SI2=67 ('C')
    /// - SLEN=2
    /// - BSIZE (little-endian u16): block_size - 1
    ///
    /// Compressed data + CRC32 + ISIZE
    fn compress_block(data: &[u8], level: Compression) -> io::Result<Vec<u8>> {
        let mut deflate = DeflateEncoder::new(Vec::new(), level);
        deflate.write_all(data)?;
        let deflated = deflate.finish()?;

        let crc = crc32fast::hash(data);
        let isize = data.len() as u32;

        let mut block = Vec::with_capacity(deflated.len() + 26);
        block.extend_from_slice(&GZIP_MAGIC);
        block.push(8); // CM (deflate)
        block.push(4); // FLG (FEXTRA)
        block.extend_from_slice(&[0, 0, 0, 0]); // MTIME
        block.push(0); // XFL
        block.push(255); // OS (unknown)

        block.extend_from_slice(&6u16.to_le_bytes()); // XLEN=6
        block.push(b'B');
        block.push(b'C');
        block.extend_from_slice(&2u16.to_le_bytes()); // SLEN=2

        // BSIZE placeholder, patched once the total size is known
        let bsize_pos = block.len();
        block.extend_from_slice(&0u16.to_le_bytes());

        block.extend_from_slice(&deflated);
        block.extend_from_slice(&crc.to_le_bytes());
        block.extend_from_slice(&isize.to_le_bytes());

        let total_size = block.len();
        if total_size > BGZF_MAX_BLOCK_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("BGZF block too large: {} bytes", total_size),
            ));
        }
        let bsize = (total_size - 1) as u16;
        block[bsize_pos..bsize_pos + 2].copy_from_slice(&bsize.to_le_bytes());

        Ok(block)
    }

    /// Compress and write all pending blocks
    fn flush_blocks(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let level = self.level;
        let compressed: Vec<_> = self
            .pending
            .par_iter()
            .map(|block| Self::compress_block(block, level))
            .collect::<io::Result<Vec<_>>>()?;

        for block in compressed {
            self.writer.write_all(&block)?;
        }

        self.pending.clear();
        Ok(())
    }

    /// Flush all remaining data, write the EOF marker if configured, and
    /// return the underlying writer
    pub fn finish(mut self) -> io::Result<W> {
        if !self.current.is_empty() {
            let block = std::mem::take(&mut self.current);
            self.pending.push(block);
        }

        self.flush_blocks()?;

        if self.write_eof {
            self.writer.write_all(&BGZF_EOF)?;
        }

        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> Write for BgzfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut remaining = buf;

        while !remaining.is_empty() {
            let space_in_block = BGZF_BLOCK_SIZE - self.current.len();
            let to_copy = remaining.len().min(space_in_block);

            self.current.extend_from_slice(&remaining[..to_copy]);
            remaining = &remaining[to_copy..];

            if self.current.len() >= BGZF_BLOCK_SIZE {
                let block =
                    std::mem::replace(&mut self.current, Vec::with_capacity(BGZF_BLOCK_SIZE));
                self.pending.push(block);

                if self.pending.len() >= self.parallel_blocks {
                    self.flush_blocks()?;
                }
            }
        }

        Ok(buf.len())
    }

    // Only whole blocks are ever emitted; a partial block stays buffered until
    // it fills or `finish` is called.
    fn flush(&mut self) -> io::Result<()> {
        self.flush_blocks()?;
        self.writer.flush()
    }
}
