mod deflate_codec;
mod lz4_codec;
mod passthrough;
mod property_bag;
mod snapshot;
mod zstd_codec;

#[cfg(test)]
mod proptest_tests;

pub use deflate_codec::Deflate;
pub use lz4_codec::Lz4;
pub use passthrough::PassThrough;
pub use property_bag::{PropertyBag, PropertyBagCodec, PropertyValue};
pub use snapshot::{PropertySnapshot, PropertySnapshotCodec};
pub use zstd_codec::Zstd;

use graphser_core::frame::{
    Compression, COMPRESSION_DEFLATE, COMPRESSION_LZ4, COMPRESSION_NONE, COMPRESSION_ZSTD,
};
use graphser_core::{CodecRegistry, FIRST_USER_TAG};

pub const TAG_PROPERTY_BAG: u32 = FIRST_USER_TAG;
pub const TAG_PROPERTY_SNAPSHOT: u32 = FIRST_USER_TAG + 1;

/// Built-in primitives plus every composite codec in this crate.
pub fn default_registry() -> graphser_core::Result<CodecRegistry> {
    Ok(CodecRegistry::builder()
        .with_builtins()
        .register(TAG_PROPERTY_BAG, PropertyBagCodec)?
        .register(TAG_PROPERTY_SNAPSHOT, PropertySnapshotCodec)?
        .build())
}

/// Resolve a compression from the `compression_id` in a frame header.
///
/// Called when opening an existing frame, so the payload can be
/// decompressed without the caller knowing how it was written.
pub fn compression_by_id(id: u16) -> anyhow::Result<Box<dyn Compression>> {
    match id {
        COMPRESSION_NONE => Ok(Box::new(PassThrough)),
        COMPRESSION_ZSTD => Ok(Box::new(Zstd::default())),
        COMPRESSION_LZ4 => Ok(Box::new(Lz4)),
        COMPRESSION_DEFLATE => Ok(Box::new(Deflate::default())),
        _ => anyhow::bail!(
            "unknown compression id {}; supported: 0 (none), 1 (zstd), 2 (lz4), 3 (deflate)",
            id
        ),
    }
}

/// Resolve a compression from a CLI name.
pub fn compression_by_name(name: &str, level: i32) -> anyhow::Result<Box<dyn Compression>> {
    match name {
        "none" | "passthrough" => Ok(Box::new(PassThrough)),
        "zstd" | "z" => Ok(Box::new(Zstd::new(level))),
        "lz4" | "l" => Ok(Box::new(Lz4)),
        "deflate" | "d" => Ok(Box::new(Deflate {
            level: level.clamp(0, 9) as u32,
        })),
        other => anyhow::bail!(
            "unknown compression '{}'. Valid options: none, zstd, lz4, deflate",
            other
        ),
    }
}
