//! Per-pass write and read sessions.
//!
//! A context owns everything that lives for exactly one pass: the byte
//! sink/source with its position, the identity table, and the recursion
//! depth. The registry is borrowed and may be shared by many passes.
//!
//! # Shared-identity wire layout
//! ```text
//! [0x01 NEW][varint id][payload]      first visit of an object
//! [0x02 BACKREF][varint id]           every later visit
//! ```

use std::any::{type_name, Any};
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};
use std::io::{Read, Write};
use std::sync::{Arc, OnceLock};

use tracing::{debug, trace};

use crate::codec::Encodable;
use crate::config::PassConfig;
use crate::error::{Error, Result};
use crate::identity::{ForwardRef, ReadIdentities, WriteIdentities};
use crate::primitive::{ByteSink, ByteSource};
use crate::registry::{CodecRegistry, NULL_TAG};

/// Marker preceding the first encoding of a shared object.
pub const NEW_OBJECT: u8 = 0x01;

/// Marker preceding a reference to an object encoded earlier in the pass.
pub const BACK_REFERENCE: u8 = 0x02;

/// Summary of a finished pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Bytes written or consumed.
    pub bytes: u64,
    /// Shared-identity ids allocated.
    pub identities: u32,
    /// Tagged values written or read, nulls included.
    pub values: u64,
}

/// The encode half of a pass.
pub struct WriteContext<'a> {
    sink: ByteSink<'a>,
    registry: &'a CodecRegistry,
    identities: WriteIdentities,
    config: PassConfig,
    depth: usize,
    values: u64,
}

impl<'a> WriteContext<'a> {
    pub fn new(sink: impl Write + 'a, registry: &'a CodecRegistry) -> Self {
        trace!("write pass opened");
        Self {
            sink: ByteSink::new(sink),
            registry,
            identities: WriteIdentities::new(),
            config: PassConfig::default(),
            depth: 0,
            values: 0,
        }
    }

    pub fn with_config(mut self, config: PassConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &'a CodecRegistry {
        self.registry
    }

    /// Bytes written so far.
    pub fn position(&self) -> u64 {
        self.sink.position()
    }

    /// Shared-identity ids allocated so far.
    pub fn identities(&self) -> u32 {
        self.identities.len()
    }

    /// Write a tag followed by the payload of the codec registered for the
    /// value's concrete type.
    pub fn write_value(&mut self, value: &dyn Encodable) -> Result<()> {
        let any = value.as_any();
        let registry = self.registry;
        let (tag, codec) = registry.encoder_for(any.type_id(), value.value_type_name())?;
        self.sink.write_varint(tag as u64)?;
        self.values += 1;
        self.enter()?;
        let result = codec.encode_dyn(self, any);
        self.depth -= 1;
        result
    }

    /// Like [`write_value`](Self::write_value), writing the null tag for `None`.
    pub fn write_nullable(&mut self, value: Option<&dyn Encodable>) -> Result<()> {
        match value {
            Some(value) => self.write_value(value),
            None => {
                self.values += 1;
                self.sink.write_varint(NULL_TAG as u64)
            }
        }
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.sink.write_u8(value)
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.sink.write_bool(value)
    }

    pub fn write_varint(&mut self, value: u64) -> Result<()> {
        self.sink.write_varint(value)
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.sink.write_varint(value as u64)
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.sink.write_i32(value)
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.sink.write_i64(value)
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.sink.write_u64(value)
    }

    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.sink.write_f64(value)
    }

    pub fn write_str(&mut self, value: &str) -> Result<()> {
        self.sink.write_str(value)
    }

    pub fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.sink.write_bytes(value)
    }

    /// Write `[count][key value]*` with keys and values on the tagged path.
    pub fn write_map<K, V, S>(&mut self, map: &HashMap<K, V, S>) -> Result<()>
    where
        K: Encodable,
        V: Encodable,
    {
        self.write_map_entries(map.iter().map(|(k, v)| (k as &dyn Encodable, v as &dyn Encodable)))
    }

    /// Like [`write_map`](Self::write_map) with entries in key order, so equal
    /// maps always produce equal bytes.
    pub fn write_sorted_map<K, V, S>(&mut self, map: &HashMap<K, V, S>) -> Result<()>
    where
        K: Encodable + Ord,
        V: Encodable,
    {
        let mut entries: Vec<(&K, &V)> = map.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        self.write_map_entries(
            entries
                .into_iter()
                .map(|(k, v)| (k as &dyn Encodable, v as &dyn Encodable)),
        )
    }

    /// Write a map from any exactly-sized entry iterator. Keys and values are
    /// dispatched on their own concrete types, so one map may mix value types.
    pub fn write_map_entries<'v, I>(&mut self, entries: I) -> Result<()>
    where
        I: ExactSizeIterator<Item = (&'v dyn Encodable, &'v dyn Encodable)>,
    {
        self.sink.write_varint(entries.len() as u64)?;
        for (key, value) in entries {
            self.write_value(key)?;
            self.write_value(value)?;
        }
        Ok(())
    }

    /// Write `[count][value]*` with every element on the tagged path.
    pub fn write_seq<T: Encodable>(&mut self, items: &[T]) -> Result<()> {
        self.sink.write_varint(items.len() as u64)?;
        for item in items {
            self.write_value(item)?;
        }
        Ok(())
    }

    /// Write `value` once per pass; later calls with the same allocation
    /// write only a back-reference.
    ///
    /// `block` writes the payload and runs only on the first visit.
    pub fn encode_preserving_shared_identity<T, F>(&mut self, value: &Arc<T>, block: F) -> Result<()>
    where
        T: ?Sized + 'static,
        F: FnOnce(&mut Self, &T) -> Result<()>,
    {
        let (id, is_new) = self.identities.reserve(value);
        if !is_new {
            trace!(id, "back-reference");
            self.sink.write_u8(BACK_REFERENCE)?;
            return self.sink.write_varint(id as u64);
        }
        self.sink.write_u8(NEW_OBJECT)?;
        self.sink.write_varint(id as u64)?;
        block(self, value)
    }

    /// Shared-identity encoding for a [`ForwardRef`]. The handle must be
    /// populated by the time it is written.
    pub fn encode_forward<T, F>(&mut self, handle: &ForwardRef<T>, block: F) -> Result<()>
    where
        T: 'static,
        F: FnOnce(&mut Self, &T) -> Result<()>,
    {
        let id = self.identities.len();
        self.encode_preserving_shared_identity(handle, |ctx, cell| match cell.get() {
            Some(value) => block(ctx, value),
            None => Err(Error::UnboundReference { id }),
        })
    }

    fn enter(&mut self) -> Result<()> {
        if self.depth >= self.config.max_depth {
            return Err(Error::DepthLimitExceeded {
                max: self.config.max_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    /// Flush the sink and end the pass.
    pub fn finish(mut self) -> Result<PassStats> {
        self.sink.flush()?;
        let stats = PassStats {
            bytes: self.sink.position(),
            identities: self.identities.len(),
            values: self.values,
        };
        debug!(bytes = stats.bytes, identities = stats.identities, values = stats.values, "write pass finished");
        Ok(stats)
    }
}

/// Containers [`ReadContext::read_map_into`] can fill.
pub trait MapContainer {
    type Key: 'static;
    type Value: 'static;

    fn insert_entry(&mut self, key: Self::Key, value: Self::Value);
}

impl<K, V, S> MapContainer for HashMap<K, V, S>
where
    K: Eq + Hash + 'static,
    V: 'static,
    S: BuildHasher,
{
    type Key = K;
    type Value = V;

    fn insert_entry(&mut self, key: K, value: V) {
        self.insert(key, value);
    }
}

impl<K: Ord + 'static, V: 'static> MapContainer for BTreeMap<K, V> {
    type Key = K;
    type Value = V;

    fn insert_entry(&mut self, key: K, value: V) {
        self.insert(key, value);
    }
}

/// The decode half of a pass.
pub struct ReadContext<'a> {
    source: ByteSource<'a>,
    registry: &'a CodecRegistry,
    identities: ReadIdentities,
    config: PassConfig,
    depth: usize,
    values: u64,
}

impl<'a> ReadContext<'a> {
    pub fn new(source: impl Read + 'a, registry: &'a CodecRegistry) -> Self {
        Self::from_source(ByteSource::new(source), registry, PassConfig::default())
    }

    /// Read from an in-memory buffer. Counts that overrun the buffer are
    /// rejected before anything is allocated for them.
    pub fn from_slice(bytes: &'a [u8], registry: &'a CodecRegistry) -> Self {
        Self::from_source(ByteSource::from_slice(bytes), registry, PassConfig::default())
    }

    pub fn from_source(source: ByteSource<'a>, registry: &'a CodecRegistry, config: PassConfig) -> Self {
        trace!("read pass opened");
        Self {
            source,
            registry,
            identities: ReadIdentities::new(),
            config,
            depth: 0,
            values: 0,
        }
    }

    pub fn with_config(mut self, config: PassConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &'a CodecRegistry {
        self.registry
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.source.position()
    }

    /// Bytes left, when the source length is known.
    pub fn remaining(&self) -> Option<u64> {
        self.source.remaining()
    }

    /// Shared-identity ids allocated so far.
    pub fn identities(&self) -> u32 {
        self.identities.len()
    }

    /// Read a tagged value, boxed as its concrete type. Null is an error here;
    /// use [`read_nullable`](Self::read_nullable) where null is allowed.
    pub fn read_value(&mut self) -> Result<Box<dyn Any>> {
        self.read_nullable()?.ok_or(Error::TypeMismatch {
            expected: "non-null value",
            found: "null",
        })
    }

    pub fn read_nullable(&mut self) -> Result<Option<Box<dyn Any>>> {
        self.read_tagged().map(|tagged| tagged.map(|(_, value)| value))
    }

    /// Read a tagged value and check it is a `T`.
    pub fn read_value_as<T: 'static>(&mut self) -> Result<T> {
        self.read_nullable_as::<T>()?.ok_or(Error::TypeMismatch {
            expected: type_name::<T>(),
            found: "null",
        })
    }

    pub fn read_nullable_as<T: 'static>(&mut self) -> Result<Option<T>> {
        let Some((tag, value)) = self.read_tagged()? else {
            return Ok(None);
        };
        match value.downcast::<T>() {
            Ok(value) => Ok(Some(*value)),
            Err(_) => Err(Error::TypeMismatch {
                expected: type_name::<T>(),
                found: self.registry.type_name_of(tag).unwrap_or("unknown"),
            }),
        }
    }

    fn read_tagged(&mut self) -> Result<Option<(u32, Box<dyn Any>)>> {
        let offset = self.source.position();
        let tag = self.source.read_varint_u32()?;
        self.values += 1;
        if tag == NULL_TAG {
            return Ok(None);
        }
        let registry = self.registry;
        let codec = registry.decoder_for(tag, offset)?;
        self.enter()?;
        let result = codec.decode_dyn(self);
        self.depth -= 1;
        result.map(|value| Some((tag, value)))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.source.read_u8()
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        self.source.read_bool()
    }

    pub fn read_varint(&mut self) -> Result<u64> {
        self.source.read_varint()
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.source.read_varint_u32()
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.source.read_i32()
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.source.read_i64()
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.source.read_u64()
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.source.read_f64()
    }

    pub fn read_string(&mut self) -> Result<String> {
        self.source.read_string(self.config.max_collection_len)
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        self.source.read_bytes(self.config.max_collection_len)
    }

    /// Read a count or length, checked against the configured limit and, when
    /// known, the bytes left. `min_item_len` is the smallest encoding of one
    /// counted item.
    pub fn read_len(&mut self, min_item_len: u64) -> Result<usize> {
        self.source.read_len(self.config.max_collection_len, min_item_len)
    }

    /// Read a map written by [`WriteContext::write_map`] into the container
    /// `factory` produces.
    pub fn read_map_into<M, F>(&mut self, factory: F) -> Result<M>
    where
        M: MapContainer,
        F: FnOnce() -> M,
    {
        self.read_map_with(factory, |ctx| ctx.read_value_as::<M::Value>())
    }

    /// Like [`read_map_into`](Self::read_map_into), keeping each value boxed
    /// as whatever concrete type its tag decoded to.
    pub fn read_any_map_into<M, F>(&mut self, factory: F) -> Result<M>
    where
        M: MapContainer<Value = Box<dyn Any>>,
        F: FnOnce() -> M,
    {
        self.read_map_with(factory, |ctx| ctx.read_value())
    }

    /// Read a map with typed keys, producing each value with `read_value`.
    pub fn read_map_with<M, F, V>(&mut self, factory: F, mut read_value: V) -> Result<M>
    where
        M: MapContainer,
        F: FnOnce() -> M,
        V: FnMut(&mut Self) -> Result<M::Value>,
    {
        // Each entry is at least two one-byte tags.
        let count = self.read_len(2)?;
        let mut map = factory();
        for _ in 0..count {
            let key = self.read_value_as::<M::Key>()?;
            let value = read_value(self)?;
            map.insert_entry(key, value);
        }
        Ok(map)
    }

    /// Read a sequence written by [`WriteContext::write_seq`].
    pub fn read_seq<T: 'static>(&mut self) -> Result<Vec<T>> {
        let count = self.read_len(1)?;
        let mut items = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            items.push(self.read_value_as::<T>()?);
        }
        Ok(items)
    }

    fn read_marker(&mut self) -> Result<(u8, u32)> {
        let offset = self.source.position();
        let marker = self.source.read_u8()?;
        if marker != NEW_OBJECT && marker != BACK_REFERENCE {
            return Err(Error::InvalidMarker { marker, offset });
        }
        let id = self.source.read_varint_u32()?;
        Ok((marker, id))
    }

    fn begin_slot(&mut self, found: u32) -> Result<u32> {
        let expected = self.identities.len();
        if found != expected {
            return Err(Error::IdentityOutOfOrder { expected, found });
        }
        Ok(self.identities.begin_slot())
    }

    /// Mirror of [`WriteContext::encode_preserving_shared_identity`].
    ///
    /// On NEW the slot is reserved before `block` runs and bound once it
    /// returns; a back-reference into the slot from inside `block` is reported
    /// as [`Error::UnboundReference`]. On BACKREF the shared instance is
    /// returned and `block` does not run.
    pub fn decode_preserving_shared_identity<T, F>(&mut self, block: F) -> Result<Arc<T>>
    where
        T: 'static,
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let (marker, id) = self.read_marker()?;
        if marker == BACK_REFERENCE {
            trace!(id, "back-reference");
            return self.identities.resolve::<T>(id);
        }
        let slot = self.begin_slot(id)?;
        let value = Arc::new(block(self)?);
        self.identities.bind(slot, Arc::clone(&value));
        Ok(value)
    }

    /// Shared-identity decoding that publishes the handle before the payload
    /// is read, so references back into it from nested values resolve.
    pub fn decode_forward<T, F>(&mut self, block: F) -> Result<ForwardRef<T>>
    where
        T: 'static,
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let (marker, id) = self.read_marker()?;
        if marker == BACK_REFERENCE {
            return self.identities.resolve::<OnceLock<T>>(id);
        }
        let slot = self.begin_slot(id)?;
        let handle: ForwardRef<T> = Arc::new(OnceLock::new());
        self.identities.bind(slot, Arc::clone(&handle));
        let value = block(self)?;
        if handle.set(value).is_err() {
            return Err(Error::ForwardAlreadyBound { id });
        }
        Ok(handle)
    }

    fn enter(&mut self) -> Result<()> {
        if self.depth >= self.config.max_depth {
            return Err(Error::DepthLimitExceeded {
                max: self.config.max_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    /// End the pass. When the source length is known, unread bytes are an
    /// error.
    pub fn finish(self) -> Result<PassStats> {
        if let Some(remaining) = self.source.remaining() {
            if remaining > 0 {
                return Err(Error::TrailingBytes { remaining });
            }
        }
        let stats = PassStats {
            bytes: self.source.position(),
            identities: self.identities.len(),
            values: self.values,
        };
        debug!(bytes = stats.bytes, identities = stats.identities, values = stats.values, "read pass finished");
        Ok(stats)
    }
}

/// Encode `value` as a complete pass into a fresh buffer.
pub fn to_bytes(registry: &CodecRegistry, value: &dyn Encodable) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut ctx = WriteContext::new(&mut buf, registry);
    ctx.write_value(value)?;
    ctx.finish()?;
    Ok(buf)
}

/// Decode a single `T` from a buffer produced by [`to_bytes`].
pub fn from_bytes<T: 'static>(registry: &CodecRegistry, bytes: &[u8]) -> Result<T> {
    let mut ctx = ReadContext::from_slice(bytes, registry);
    let value = ctx.read_value_as::<T>()?;
    ctx.finish()?;
    Ok(value)
}
