//! Unsigned LEB128 variable-length integers.
//!
//! Seven payload bits per byte, least significant group first, high bit set on
//! every byte except the last. Used for value tags, identity ids, lengths and
//! collection counts.

/// Longest encoding of a `u64`.
pub const MAX_LEN: usize = 10;

/// Encode `value` into `buf`, returning the number of bytes used.
pub fn encode(mut value: u64, buf: &mut [u8; MAX_LEN]) -> usize {
    let mut i = 0;
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf[i] = byte;
            return i + 1;
        }
        buf[i] = byte | 0x80;
        i += 1;
    }
}

/// Overflow signalled by [`VarIntDecoder::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overflow;

/// Byte-at-a-time decoder, for sources that can only be read sequentially.
#[derive(Debug, Default)]
pub struct VarIntDecoder {
    value: u64,
    shift: u32,
}

impl VarIntDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte. Returns the decoded value once the final byte arrives.
    pub fn push(&mut self, byte: u8) -> Result<Option<u64>, Overflow> {
        let payload = (byte & 0x7F) as u64;
        if self.shift == 63 && payload > 1 {
            return Err(Overflow);
        }
        if self.shift > 63 {
            return Err(Overflow);
        }
        self.value |= payload << self.shift;
        if byte & 0x80 == 0 {
            return Ok(Some(self.value));
        }
        self.shift += 7;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(value: u64) -> Vec<u8> {
        let mut buf = [0u8; MAX_LEN];
        let n = encode(value, &mut buf);
        buf[..n].to_vec()
    }

    fn decode(bytes: &[u8]) -> Result<Option<(u64, usize)>, Overflow> {
        let mut decoder = VarIntDecoder::new();
        for (i, &b) in bytes.iter().enumerate() {
            if let Some(v) = decoder.push(b)? {
                return Ok(Some((v, i + 1)));
            }
        }
        Ok(None)
    }

    #[test]
    fn small_values_take_one_byte() {
        assert_eq!(encoded(0), vec![0x00]);
        assert_eq!(encoded(1), vec![0x01]);
        assert_eq!(encoded(127), vec![0x7F]);
    }

    #[test]
    fn multi_byte_layout() {
        assert_eq!(encoded(128), vec![0x80, 0x01]);
        assert_eq!(encoded(300), vec![0xAC, 0x02]);
        assert_eq!(encoded(u64::MAX).len(), MAX_LEN);
    }

    #[test]
    fn decode_reports_consumed_length() {
        let mut bytes = encoded(300);
        bytes.push(0xFF);
        assert_eq!(decode(&bytes), Ok(Some((300, 2))));
        assert_eq!(decode(&[0x80]), Ok(None));
        assert_eq!(decode(&encoded(u64::MAX)), Ok(Some((u64::MAX, MAX_LEN))));
    }

    #[test]
    fn eleven_byte_varint_overflows() {
        let bytes = [0xFF; 11];
        assert_eq!(decode(&bytes), Err(Overflow));
    }
}
