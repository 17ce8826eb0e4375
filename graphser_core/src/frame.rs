//! Checksummed, optionally compressed envelope around one pass's bytes.
//!
//! # Layout
//! ```text
//! [HEADER: 40 bytes]
//!   magic[8] + version:u16 + compression_id:u16 + flags:u32
//!   + raw_len:u64 + payload_len:u64 + checksum:u64
//! [PAYLOAD: payload_len bytes, compressed with compression_id]
//! ```
//! All integers are little endian. The checksum is xxh3-64 over the stored
//! (compressed) payload, so corruption is caught before decompression runs.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::{debug, warn};
use xxhash_rust::xxh3::xxh3_64;

use crate::error::{Error, Result};

/// Magic bytes opening every frame.
pub const MAGIC: &[u8; 8] = b"GRPHSER\x01";

/// Fixed size of the frame header in bytes.
pub const HEADER_SIZE: usize = 40;

pub const FORMAT_VERSION: u16 = 1;

/// The payload carries an xxh3-64 checksum.
pub const FLAG_HAS_CHECKSUM: u32 = 1 << 0;

// ── Compression IDs ────────────────────────────────────────────────────────

pub const COMPRESSION_NONE: u16 = 0;
pub const COMPRESSION_ZSTD: u16 = 1;
pub const COMPRESSION_LZ4: u16 = 2;
pub const COMPRESSION_DEFLATE: u16 = 3;

/// Whole-payload compression applied to a frame.
///
/// Each implementation is identified by a stable numeric `id()` stored in the
/// frame header, which is how a reader picks the matching implementation.
pub trait Compression: Send + Sync {
    /// Stable ID stored in the frame header.
    fn id(&self) -> u16;

    /// Human-readable name for CLI display.
    fn name(&self) -> &'static str;

    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>>;

    /// `raw_len` is the uncompressed length recorded in the header. Output
    /// longer than that is an error, and nothing beyond it is allocated.
    fn decompress(&self, stored: &[u8], raw_len: usize) -> Result<Vec<u8>>;
}

/// Decoded frame header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: u16,
    pub compression_id: u16,
    pub flags: u32,
    /// Length of the value stream before compression.
    pub raw_len: u64,
    /// Length of the stored payload following the header.
    pub payload_len: u64,
    /// xxh3-64 of the stored payload.
    pub checksum: u64,
}

impl FrameHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[..8].copy_from_slice(MAGIC);
        buf[8..10].copy_from_slice(&self.version.to_le_bytes());
        buf[10..12].copy_from_slice(&self.compression_id.to_le_bytes());
        buf[12..16].copy_from_slice(&self.flags.to_le_bytes());
        buf[16..24].copy_from_slice(&self.raw_len.to_le_bytes());
        buf[24..32].copy_from_slice(&self.payload_len.to_le_bytes());
        buf[32..40].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Parse a header, checking the magic and version.
    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Result<Self> {
        if &buf[..8] != MAGIC {
            return Err(Error::BadHeader("invalid magic bytes".into()));
        }
        let le16 = |at: usize| u16::from_le_bytes([buf[at], buf[at + 1]]);
        let le32 = |at: usize| {
            let mut b = [0u8; 4];
            b.copy_from_slice(&buf[at..at + 4]);
            u32::from_le_bytes(b)
        };
        let le64 = |at: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&buf[at..at + 8]);
            u64::from_le_bytes(b)
        };
        let header = Self {
            version: le16(8),
            compression_id: le16(10),
            flags: le32(12),
            raw_len: le64(16),
            payload_len: le64(24),
            checksum: le64(32),
        };
        if header.version != FORMAT_VERSION {
            return Err(Error::UnsupportedVersion(header.version));
        }
        Ok(header)
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }
}

/// A header together with its stored (still compressed) payload.
#[derive(Debug, Clone)]
pub struct Frame {
    pub header: FrameHeader,
    payload: Vec<u8>,
}

impl Frame {
    /// Compress `raw` and compute the header for it.
    pub fn seal(raw: &[u8], compression: &dyn Compression) -> Result<Self> {
        let payload = compression.compress(raw)?;
        let header = FrameHeader {
            version: FORMAT_VERSION,
            compression_id: compression.id(),
            flags: FLAG_HAS_CHECKSUM,
            raw_len: raw.len() as u64,
            payload_len: payload.len() as u64,
            checksum: xxh3_64(&payload),
        };
        debug!(
            compression = compression.name(),
            raw_len = header.raw_len,
            payload_len = header.payload_len,
            "frame sealed"
        );
        Ok(Self { header, payload })
    }

    /// The stored payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn write_to(&self, mut w: impl Write) -> Result<()> {
        w.write_all(&self.header.to_bytes())?;
        w.write_all(&self.payload)?;
        w.flush()?;
        Ok(())
    }

    /// Read a header and its payload, verifying the checksum.
    pub fn read_from(mut r: impl Read) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        r.read_exact(&mut buf).map_err(truncated_header)?;
        let header = FrameHeader::from_bytes(&buf)?;

        let mut payload = Vec::new();
        r.by_ref().take(header.payload_len).read_to_end(&mut payload)?;
        if payload.len() as u64 != header.payload_len {
            return Err(Error::Truncated {
                offset: HEADER_SIZE as u64 + payload.len() as u64,
            });
        }

        if header.has_flag(FLAG_HAS_CHECKSUM) {
            let actual = xxh3_64(&payload);
            if actual != header.checksum {
                warn!(expected = header.checksum, actual, "frame checksum mismatch");
                return Err(Error::ChecksumMismatch {
                    expected: header.checksum,
                    actual,
                });
            }
        }
        Ok(Self { header, payload })
    }

    /// Decompress the payload back into the value stream.
    ///
    /// `compression` must match the `compression_id` stored in the header.
    pub fn open(&self, compression: &dyn Compression) -> Result<Vec<u8>> {
        if compression.id() != self.header.compression_id {
            return Err(Error::BadHeader(format!(
                "compression mismatch: frame uses {} but {} (id {}) was supplied",
                self.header.compression_id,
                compression.name(),
                compression.id()
            )));
        }
        let raw = compression.decompress(&self.payload, self.header.raw_len as usize)?;
        if raw.len() as u64 != self.header.raw_len {
            return Err(Error::Decompress(format!(
                "payload decompressed to {} bytes but header says {}",
                raw.len(),
                self.header.raw_len
            )));
        }
        Ok(raw)
    }

    /// Seal `raw` and write it to a new file at `path`.
    pub fn write_file(path: impl AsRef<Path>, raw: &[u8], compression: &dyn Compression) -> Result<FrameHeader> {
        let frame = Self::seal(raw, compression)?;
        frame.write_to(BufWriter::new(File::create(path)?))?;
        Ok(frame.header)
    }

    pub fn read_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::read_from(BufReader::new(File::open(path)?))
    }
}

fn truncated_header(e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::UnexpectedEof => Error::BadHeader("file shorter than the frame header".into()),
        _ => Error::Io(e),
    }
}
