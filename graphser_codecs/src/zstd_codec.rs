use std::io::Read;

use graphser_core::frame::{Compression, COMPRESSION_ZSTD};
use graphser_core::{Error, Result};

/// Zstandard payload compression at the configured level (default: 3).
///
/// Best for: large passes with many repeated keys and strings.
pub struct Zstd {
    /// Compression level (1 = fast / larger, 22 = slow / smallest).
    pub level: i32,
}

impl Default for Zstd {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl Zstd {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Compression for Zstd {
    fn id(&self) -> u16 {
        COMPRESSION_ZSTD
    }

    fn name(&self) -> &'static str {
        "zstd"
    }

    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        zstd::bulk::compress(raw, self.level).map_err(|e| Error::Compress(e.to_string()))
    }

    fn decompress(&self, stored: &[u8], raw_len: usize) -> Result<Vec<u8>> {
        let mut raw = Vec::new();
        zstd::stream::read::Decoder::new(stored)
            .map_err(|e| Error::Decompress(format!("zstd: {}", e)))?
            .take(raw_len as u64 + 1)
            .read_to_end(&mut raw)
            .map_err(|e| Error::Decompress(format!("zstd: {}", e)))?;
        if raw.len() > raw_len {
            return Err(Error::Decompress(format!(
                "zstd: payload expands past the {} bytes in the header",
                raw_len
            )));
        }
        Ok(raw)
    }
}
