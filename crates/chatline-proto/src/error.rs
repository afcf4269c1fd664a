//! Protocol error types.

use thiserror::Error;

/// Errors from parsing identifiers or encoding/decoding frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtoError {
    /// Key alias does not match `KA-` followed by 16 digits.
    #[error("invalid key alias: {0:?}")]
    InvalidKeyAlias(String),

    /// Room channel is not 32 lowercase hex digits.
    #[error("invalid room channel: {0:?}")]
    InvalidRoomChannel(String),

    /// Frame length prefix exceeds the maximum.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Declared frame size.
        size: usize,
        /// Maximum allowed frame size.
        max: usize,
    },

    /// CBOR serialization failed.
    #[error("CBOR encode failed: {0}")]
    Encode(String),

    /// CBOR deserialization failed.
    #[error("CBOR decode failed: {0}")]
    Decode(String),
}
