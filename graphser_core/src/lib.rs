//! Object-graph serialization with shared-identity preservation.
//!
//! A pass runs through a [`WriteContext`] or [`ReadContext`]; values are
//! dispatched to [`Codec`]s by a [`CodecRegistry`], and objects shared through
//! an `Arc` are written once and referenced by id afterwards.

pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod frame;
pub mod identity;
pub mod primitive;
pub mod registry;
pub mod varint;

pub use codec::{Codec, DynCodec, Encodable};
pub use config::PassConfig;
pub use context::{from_bytes, to_bytes, MapContainer, PassStats, ReadContext, WriteContext};
pub use error::{Error, Result};
pub use frame::{Compression, Frame, FrameHeader, HEADER_SIZE, MAGIC};
pub use identity::{ForwardRef, ReadIdentities, WriteIdentities};
pub use registry::{CodecRegistry, CodecRegistryBuilder, FIRST_USER_TAG, NULL_TAG};
