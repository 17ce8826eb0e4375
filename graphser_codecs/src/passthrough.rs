use graphser_core::frame::{Compression, COMPRESSION_NONE};
use graphser_core::{Error, Result};

/// Stores the value stream verbatim.
///
/// Useful for inspecting the raw stream with a hex dump, and for tiny
/// passes where compression framing costs more than it saves.
pub struct PassThrough;

impl Compression for PassThrough {
    fn id(&self) -> u16 {
        COMPRESSION_NONE
    }

    fn name(&self) -> &'static str {
        "none"
    }

    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        Ok(raw.to_vec())
    }

    fn decompress(&self, stored: &[u8], raw_len: usize) -> Result<Vec<u8>> {
        if stored.len() > raw_len {
            return Err(Error::Decompress(format!(
                "stored payload is {} bytes but the header says {}",
                stored.len(),
                raw_len
            )));
        }
        Ok(stored.to_vec())
    }
}
