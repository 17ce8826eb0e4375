//! Primitive byte I/O and the built-in scalar codecs.
//!
//! Layout: `bool` is one byte, `i32`/`i64`/`u64`/`f64` are fixed-width little
//! endian, `u32` and every length is a LEB128 varint, strings and byte strings
//! are `[varint len][bytes]`.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::codec::Codec;
use crate::context::{ReadContext, WriteContext};
use crate::error::{Error, Result};
use crate::varint::{self, VarIntDecoder};

pub const TAG_STRING: u32 = 1;
pub const TAG_BOOL: u32 = 2;
pub const TAG_I32: u32 = 3;
pub const TAG_I64: u32 = 4;
pub const TAG_U32: u32 = 5;
pub const TAG_U64: u32 = 6;
pub const TAG_F64: u32 = 7;
pub const TAG_BYTES: u32 = 8;

/// Position-tracking byte sink.
pub struct ByteSink<'a> {
    inner: Box<dyn Write + 'a>,
    position: u64,
}

impl<'a> ByteSink<'a> {
    pub fn new(inner: impl Write + 'a) -> Self {
        Self {
            inner: Box::new(inner),
            position: 0,
        }
    }

    /// Bytes written so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.inner.write_u8(value)?;
        self.position += 1;
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(value as u8)
    }

    pub fn write_varint(&mut self, value: u64) -> Result<()> {
        let mut buf = [0u8; varint::MAX_LEN];
        let n = varint::encode(value, &mut buf);
        self.write_all(&buf[..n])
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.inner.write_i32::<LittleEndian>(value)?;
        self.position += 4;
        Ok(())
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.inner.write_i64::<LittleEndian>(value)?;
        self.position += 8;
        Ok(())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.inner.write_u64::<LittleEndian>(value)?;
        self.position += 8;
        Ok(())
    }

    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.inner.write_f64::<LittleEndian>(value)?;
        self.position += 8;
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_varint(bytes.len() as u64)?;
        self.write_all(bytes)
    }

    pub fn write_str(&mut self, value: &str) -> Result<()> {
        self.write_bytes(value.as_bytes())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

/// Position-tracking byte source with an optional known length.
pub struct ByteSource<'a> {
    inner: Box<dyn Read + 'a>,
    position: u64,
    limit: Option<u64>,
}

impl<'a> ByteSource<'a> {
    pub fn new(inner: impl Read + 'a) -> Self {
        Self {
            inner: Box::new(inner),
            position: 0,
            limit: None,
        }
    }

    /// A source over an in-memory buffer, whose remaining length is known.
    pub fn from_slice(bytes: &'a [u8]) -> Self {
        Self {
            inner: Box::new(bytes),
            position: 0,
            limit: Some(bytes.len() as u64),
        }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Bytes left, when the source length is known.
    pub fn remaining(&self) -> Option<u64> {
        self.limit.map(|limit| limit.saturating_sub(self.position))
    }

    fn eof<T>(&self, result: io::Result<T>) -> Result<T> {
        result.map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => Error::Truncated {
                offset: self.position,
            },
            _ => Error::Io(e),
        })
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let result = self.inner.read_exact(buf);
        self.eof(result)?;
        self.position += buf.len() as u64;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let result = self.inner.read_u8();
        let value = self.eof(result)?;
        self.position += 1;
        Ok(value)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        let offset = self.position;
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            byte => Err(Error::InvalidBool { byte, offset }),
        }
    }

    pub fn read_varint(&mut self) -> Result<u64> {
        let mut decoder = VarIntDecoder::new();
        loop {
            let byte = self.read_u8()?;
            match decoder.push(byte) {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(_) => {
                    return Err(Error::VarIntOverflow {
                        offset: self.position,
                    })
                }
            }
        }
    }

    /// Read a varint that must fit a `u32`.
    pub fn read_varint_u32(&mut self) -> Result<u32> {
        let offset = self.position;
        let value = self.read_varint()?;
        u32::try_from(value).map_err(|_| Error::VarIntOverflow { offset })
    }

    /// Read a length or count and check it against `max` and the bytes left.
    ///
    /// `min_item_len` is the smallest encoding of one counted item, so a count
    /// can be rejected before any item is read.
    pub fn read_len(&mut self, max: u64, min_item_len: u64) -> Result<usize> {
        let length = self.read_varint()?;
        if length > max {
            return Err(Error::LengthTooLong { length, max });
        }
        if let Some(remaining) = self.remaining() {
            if length.saturating_mul(min_item_len) > remaining {
                return Err(Error::LengthExceedsStream { length, remaining });
            }
        }
        Ok(length as usize)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let result = self.inner.read_i32::<LittleEndian>();
        let value = self.eof(result)?;
        self.position += 4;
        Ok(value)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let result = self.inner.read_i64::<LittleEndian>();
        let value = self.eof(result)?;
        self.position += 8;
        Ok(value)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let result = self.inner.read_u64::<LittleEndian>();
        let value = self.eof(result)?;
        self.position += 8;
        Ok(value)
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        let result = self.inner.read_f64::<LittleEndian>();
        let value = self.eof(result)?;
        self.position += 8;
        Ok(value)
    }

    pub fn read_bytes(&mut self, max: u64) -> Result<Vec<u8>> {
        let len = self.read_len(max, 1)?;
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_string(&mut self, max: u64) -> Result<String> {
        let offset = self.position;
        let bytes = self.read_bytes(max)?;
        String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8 { offset })
    }
}

macro_rules! scalar_codec {
    ($(#[$meta:meta])* $name:ident, $ty:ty, $write:ident, $read:ident) => {
        $(#[$meta])*
        #[derive(Debug, Default, Clone, Copy)]
        pub struct $name;

        impl Codec for $name {
            type Value = $ty;

            fn encode(&self, ctx: &mut WriteContext<'_>, value: &$ty) -> Result<()> {
                ctx.$write(*value)
            }

            fn decode(&self, ctx: &mut ReadContext<'_>) -> Result<$ty> {
                ctx.$read()
            }
        }
    };
}

scalar_codec!(BoolCodec, bool, write_bool, read_bool);
scalar_codec!(I32Codec, i32, write_i32, read_i32);
scalar_codec!(I64Codec, i64, write_i64, read_i64);
scalar_codec!(
    /// `u32` values go out as varints, unlike the fixed-width 64-bit kinds.
    U32Codec,
    u32,
    write_u32,
    read_u32
);
scalar_codec!(U64Codec, u64, write_u64, read_u64);
scalar_codec!(F64Codec, f64, write_f64, read_f64);

#[derive(Debug, Default, Clone, Copy)]
pub struct StringCodec;

impl Codec for StringCodec {
    type Value = String;

    fn encode(&self, ctx: &mut WriteContext<'_>, value: &String) -> Result<()> {
        ctx.write_str(value)
    }

    fn decode(&self, ctx: &mut ReadContext<'_>) -> Result<String> {
        ctx.read_string()
    }
}

/// Opaque byte strings, carried as `Vec<u8>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytesCodec;

impl Codec for BytesCodec {
    type Value = Vec<u8>;

    fn encode(&self, ctx: &mut WriteContext<'_>, value: &Vec<u8>) -> Result<()> {
        ctx.write_bytes(value)
    }

    fn decode(&self, ctx: &mut ReadContext<'_>) -> Result<Vec<u8>> {
        ctx.read_bytes()
    }
}
