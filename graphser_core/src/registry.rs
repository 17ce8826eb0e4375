//! Codec lookup by runtime type (encode) and by stream tag (decode).

use std::any::{type_name, TypeId};
use std::collections::HashMap;

use tracing::debug;

use crate::codec::{Codec, DynCodec};
use crate::error::{Error, Result};
use crate::primitive::{
    BoolCodec, BytesCodec, F64Codec, I32Codec, I64Codec, StringCodec, U32Codec, U64Codec,
    TAG_BOOL, TAG_BYTES, TAG_F64, TAG_I32, TAG_I64, TAG_STRING, TAG_U32, TAG_U64,
};

/// Tag written in place of a value to mean "no value".
pub const NULL_TAG: u32 = 0;

/// Lowest tag available to codecs registered outside this crate.
/// Tags below it are reserved for null and the built-in primitives.
pub const FIRST_USER_TAG: u32 = 32;

/// Immutable mapping between value types, stream tags, and codecs.
///
/// Built once with [`CodecRegistryBuilder`] and then shared by any number of
/// passes, typically behind an `Arc`.
pub struct CodecRegistry {
    by_type: HashMap<TypeId, u32>,
    by_tag: HashMap<u32, Box<dyn DynCodec>>,
}

impl CodecRegistry {
    pub fn builder() -> CodecRegistryBuilder {
        CodecRegistryBuilder::new()
    }

    /// A registry holding only the built-in primitive codecs.
    pub fn with_builtins() -> Self {
        CodecRegistryBuilder::new().with_builtins().build()
    }

    /// Resolve the codec for a concrete runtime type.
    ///
    /// Fails with [`Error::NoCodec`] naming the type when nothing is
    /// registered for it.
    pub fn encoder_for(
        &self,
        type_id: TypeId,
        type_name: &'static str,
    ) -> Result<(u32, &dyn DynCodec)> {
        let tag = *self
            .by_type
            .get(&type_id)
            .ok_or(Error::NoCodec { type_name })?;
        let codec = self
            .by_tag
            .get(&tag)
            .ok_or(Error::NoCodec { type_name })?;
        Ok((tag, codec.as_ref()))
    }

    /// Resolve the codec a tag read from the stream refers to.
    pub fn decoder_for(&self, tag: u32, offset: u64) -> Result<&dyn DynCodec> {
        self.by_tag
            .get(&tag)
            .map(|codec| codec.as_ref())
            .ok_or(Error::UnknownTag { tag, offset })
    }

    /// Tag bound to `T`, if any.
    pub fn tag_of<T: 'static>(&self) -> Option<u32> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Name of the type decoded under `tag`.
    pub fn type_name_of(&self, tag: u32) -> Option<&'static str> {
        self.by_tag.get(&tag).map(|codec| codec.value_name())
    }

    /// Number of registered codecs.
    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}

/// Assembles a [`CodecRegistry`], rejecting conflicting registrations.
pub struct CodecRegistryBuilder {
    registry: CodecRegistry,
}

impl Default for CodecRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecRegistryBuilder {
    pub fn new() -> Self {
        Self {
            registry: CodecRegistry {
                by_type: HashMap::new(),
                by_tag: HashMap::new(),
            },
        }
    }

    /// Install the primitive codecs under their reserved tags.
    pub fn with_builtins(mut self) -> Self {
        self.insert_builtin(TAG_STRING, StringCodec);
        self.insert_builtin(TAG_BOOL, BoolCodec);
        self.insert_builtin(TAG_I32, I32Codec);
        self.insert_builtin(TAG_I64, I64Codec);
        self.insert_builtin(TAG_U32, U32Codec);
        self.insert_builtin(TAG_U64, U64Codec);
        self.insert_builtin(TAG_F64, F64Codec);
        self.insert_builtin(TAG_BYTES, BytesCodec);
        self
    }

    fn insert_builtin<C: Codec>(&mut self, tag: u32, codec: C) {
        self.registry.by_type.insert(TypeId::of::<C::Value>(), tag);
        self.registry.by_tag.insert(tag, Box::new(codec));
    }

    /// Bind `codec` to `tag`. The tag must be at least [`FIRST_USER_TAG`] and
    /// neither the tag nor the codec's value type may already be bound.
    pub fn register<C: Codec>(mut self, tag: u32, codec: C) -> Result<Self> {
        if tag < FIRST_USER_TAG {
            return Err(Error::ReservedTag { tag });
        }
        if let Some(existing) = self.registry.by_tag.get(&tag) {
            return Err(Error::DuplicateTag {
                tag,
                existing: existing.value_name(),
            });
        }
        let type_id = TypeId::of::<C::Value>();
        if self.registry.by_type.contains_key(&type_id) {
            return Err(Error::DuplicateType {
                type_name: type_name::<C::Value>(),
            });
        }
        self.registry.by_type.insert(type_id, tag);
        self.registry.by_tag.insert(tag, Box::new(codec));
        Ok(self)
    }

    pub fn build(self) -> CodecRegistry {
        debug!(codecs = self.registry.len(), "codec registry built");
        self.registry
    }
}
