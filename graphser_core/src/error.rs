//! Error type shared by every serialization pass.

use std::io;

/// Result alias for graph serialization operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while encoding or decoding an object graph.
///
/// Variants fall into four groups: stream corruption, codec resolution,
/// registry configuration, and I/O from the underlying sink or source.
/// None of them are retried at this layer; an aborted pass must be restarted
/// from scratch by the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from the byte sink or source
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stream ended in the middle of a value
    #[error("stream truncated at offset {offset}")]
    Truncated {
        /// Byte offset where the read came up short
        offset: u64,
    },

    /// A shared-identity marker byte was neither NEW nor BACKREF
    #[error("invalid identity marker {marker:#04x} at offset {offset}")]
    InvalidMarker {
        /// The byte that was read
        marker: u8,
        /// Offset of the marker byte
        offset: u64,
    },

    /// A NEW marker carried an id other than the next one in sequence
    #[error("identity id {found} out of order, expected {expected}")]
    IdentityOutOfOrder {
        /// Next id the decoder would allocate
        expected: u32,
        /// Id found in the stream
        found: u32,
    },

    /// Back-reference to a slot that was reserved but never bound
    #[error("back-reference to id {id} before its value was bound")]
    UnboundReference {
        /// Identity id
        id: u32,
    },

    /// A forward handle was populated while its own payload was being decoded
    #[error("forward handle {id} was bound during its own decode")]
    ForwardAlreadyBound {
        /// Identity id
        id: u32,
    },

    /// Back-reference to an id that was never reserved in this pass
    #[error("back-reference to unknown id {id} ({allocated} ids allocated)")]
    UnknownReference {
        /// Identity id
        id: u32,
        /// Number of ids allocated so far
        allocated: u32,
    },

    /// A value tag with no codec registered for it
    #[error("unknown value tag {tag} at offset {offset}")]
    UnknownTag {
        /// The tag that was read
        tag: u32,
        /// Offset of the tag
        offset: u64,
    },

    /// The decoded value is not of the type the call site asked for
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Requested type
        expected: &'static str,
        /// Type actually decoded
        found: &'static str,
    },

    /// A length or count field claims more data than the stream holds
    #[error("length {length} exceeds the {remaining} bytes left in the stream")]
    LengthExceedsStream {
        /// Declared length
        length: u64,
        /// Bytes remaining
        remaining: u64,
    },

    /// A length or count field exceeds the configured collection limit
    #[error("length {length} exceeds the configured limit of {max}")]
    LengthTooLong {
        /// Declared length
        length: u64,
        /// Configured maximum
        max: u64,
    },

    /// A boolean byte other than 0 or 1
    #[error("invalid boolean byte {byte:#04x} at offset {offset}")]
    InvalidBool {
        /// The byte that was read
        byte: u8,
        /// Offset of the byte
        offset: u64,
    },

    /// Bytes left over after the last value of a pass
    #[error("{remaining} trailing bytes after the end of the pass")]
    TrailingBytes {
        /// Unconsumed byte count
        remaining: u64,
    },

    /// A string payload was not valid UTF-8
    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 {
        /// Offset of the string payload
        offset: u64,
    },

    /// A varint ran past the width of its target integer
    #[error("varint overflow at offset {offset}")]
    VarIntOverflow {
        /// Offset where decoding stopped
        offset: u64,
    },

    /// Codec recursion went deeper than the configured limit
    #[error("nesting depth exceeded the limit of {max}")]
    DepthLimitExceeded {
        /// Configured maximum depth
        max: usize,
    },

    /// No codec is registered for a runtime type encountered during encode
    #[error("no codec registered for type {type_name}")]
    NoCodec {
        /// Name of the offending type
        type_name: &'static str,
    },

    /// Two codecs were registered under the same tag
    #[error("tag {tag} is already bound to {existing}")]
    DuplicateTag {
        /// The contested tag
        tag: u32,
        /// Type already registered under the tag
        existing: &'static str,
    },

    /// Two codecs were registered for the same value type
    #[error("type {type_name} already has a codec")]
    DuplicateType {
        /// The contested type
        type_name: &'static str,
    },

    /// A user codec tried to claim a tag reserved for null or built-ins
    #[error("tag {tag} is reserved")]
    ReservedTag {
        /// The reserved tag
        tag: u32,
    },

    /// Frame header is malformed or carries the wrong magic
    #[error("bad frame header: {0}")]
    BadHeader(String),

    /// Frame was written by an unknown format version
    #[error("unsupported frame version {0}")]
    UnsupportedVersion(u16),

    /// Frame payload does not hash to the recorded checksum
    #[error("frame checksum mismatch: expected {expected:016x}, got {actual:016x}")]
    ChecksumMismatch {
        /// Checksum stored in the header
        expected: u64,
        /// Checksum computed over the payload
        actual: u64,
    },

    /// Frame payload compression failed
    #[error("compression failed: {0}")]
    Compress(String),

    /// Frame payload decompression failed
    #[error("decompression failed: {0}")]
    Decompress(String),
}

impl Error {
    /// Returns true for errors caused by malformed or inconsistent input data.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::Truncated { .. }
                | Error::InvalidMarker { .. }
                | Error::IdentityOutOfOrder { .. }
                | Error::InvalidBool { .. }
                | Error::TrailingBytes { .. }
                | Error::UnboundReference { .. }
                | Error::ForwardAlreadyBound { .. }
                | Error::UnknownReference { .. }
                | Error::UnknownTag { .. }
                | Error::TypeMismatch { .. }
                | Error::LengthExceedsStream { .. }
                | Error::LengthTooLong { .. }
                | Error::InvalidUtf8 { .. }
                | Error::VarIntOverflow { .. }
                | Error::DepthLimitExceeded { .. }
                | Error::BadHeader(_)
                | Error::UnsupportedVersion(_)
                | Error::ChecksumMismatch { .. }
                | Error::Decompress(_)
        )
    }
}
