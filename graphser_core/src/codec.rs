use std::any::{type_name, Any, TypeId};

use crate::context::{ReadContext, WriteContext};
use crate::error::{Error, Result};

/// Paired encode/decode logic for one value type.
///
/// Implementations:
/// - Hold no per-pass state. Everything that lives for a pass (identity
///   table, stream position, depth) is reached through the context.
/// - Must perform the same sequence of primitive reads in `decode` as the
///   primitive writes `encode` performed, so ids and offsets line up.
/// - Recurse into nested values through `ctx.write_value` / `ctx.read_value`,
///   which dispatch through the registry.
pub trait Codec: Send + Sync + 'static {
    /// The concrete type this codec handles. Dispatch keys on its `TypeId`.
    type Value: 'static;

    fn encode(&self, ctx: &mut WriteContext<'_>, value: &Self::Value) -> Result<()>;

    fn decode(&self, ctx: &mut ReadContext<'_>) -> Result<Self::Value>;
}

/// A value that can be handed to [`WriteContext::write_value`].
///
/// Implemented for every `'static` type; whether a codec actually exists for
/// the concrete type is only known at dispatch time.
pub trait Encodable: Any {
    fn as_any(&self) -> &dyn Any;

    /// Name of the concrete type, for error reports.
    fn value_type_name(&self) -> &'static str;
}

impl<T: Any> Encodable for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn value_type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

/// Object-safe view of a [`Codec`], as stored in the registry.
pub trait DynCodec: Send + Sync {
    fn value_type(&self) -> TypeId;

    fn value_name(&self) -> &'static str;

    fn encode_dyn(&self, ctx: &mut WriteContext<'_>, value: &dyn Any) -> Result<()>;

    fn decode_dyn(&self, ctx: &mut ReadContext<'_>) -> Result<Box<dyn Any>>;
}

impl<C: Codec> DynCodec for C {
    fn value_type(&self) -> TypeId {
        TypeId::of::<C::Value>()
    }

    fn value_name(&self) -> &'static str {
        type_name::<C::Value>()
    }

    fn encode_dyn(&self, ctx: &mut WriteContext<'_>, value: &dyn Any) -> Result<()> {
        let value = value
            .downcast_ref::<C::Value>()
            .ok_or(Error::TypeMismatch {
                expected: type_name::<C::Value>(),
                found: "value of another type",
            })?;
        self.encode(ctx, value)
    }

    fn decode_dyn(&self, ctx: &mut ReadContext<'_>) -> Result<Box<dyn Any>> {
        Ok(Box::new(self.decode(ctx)?))
    }
}
