use graphser_core::frame::{Compression, COMPRESSION_LZ4};
use graphser_core::{Error, Result};
use lz4_flex::{compress_prepend_size, decompress_size_prepended};

/// LZ4 payload compression.
///
/// Fastest to decode of the bundled options; a good default for cache
/// entries read on every run.
pub struct Lz4;

impl Compression for Lz4 {
    fn id(&self) -> u16 {
        COMPRESSION_LZ4
    }

    fn name(&self) -> &'static str {
        "lz4"
    }

    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        Ok(compress_prepend_size(raw))
    }

    fn decompress(&self, stored: &[u8], raw_len: usize) -> Result<Vec<u8>> {
        // The block carries its own little-endian u32 size; check it before
        // it drives the allocation.
        let prefix: [u8; 4] = stored
            .get(..4)
            .and_then(|p| p.try_into().ok())
            .ok_or_else(|| Error::Decompress("lz4: payload shorter than its size prefix".into()))?;
        let declared = u32::from_le_bytes(prefix) as usize;
        if declared > raw_len {
            return Err(Error::Decompress(format!(
                "lz4: block declares {} bytes but the header says {}",
                declared, raw_len
            )));
        }
        decompress_size_prepended(stored).map_err(|e| Error::Decompress(format!("lz4: {}", e)))
    }
}
