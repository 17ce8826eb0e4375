use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use graphser_core::frame::{Compression, COMPRESSION_DEFLATE};
use graphser_core::{Error, Result};

/// Raw DEFLATE payload compression.
pub struct Deflate {
    pub level: u32,
}

impl Default for Deflate {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl Compression for Deflate {
    fn id(&self) -> u16 {
        COMPRESSION_DEFLATE
    }

    fn name(&self) -> &'static str {
        "deflate"
    }

    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        let mut enc = DeflateEncoder::new(Vec::new(), flate2::Compression::new(self.level));
        enc.write_all(raw).map_err(|e| Error::Compress(e.to_string()))?;
        enc.finish().map_err(|e| Error::Compress(e.to_string()))
    }

    fn decompress(&self, stored: &[u8], raw_len: usize) -> Result<Vec<u8>> {
        let mut raw = Vec::new();
        DeflateDecoder::new(stored)
            .take(raw_len as u64 + 1)
            .read_to_end(&mut raw)
            .map_err(|e| Error::Decompress(format!("deflate: {}", e)))?;
        if raw.len() > raw_len {
            return Err(Error::Decompress(format!(
                "deflate: payload inflates past the {} bytes in the header",
                raw_len
            )));
        }
        Ok(raw)
    }
}
