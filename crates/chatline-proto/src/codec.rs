//! Length-prefixed CBOR framing.
//!
//! Each frame is a big-endian `u32` body length followed by the CBOR body.
//! Decoding is incremental: a partial buffer yields `Ok(None)` and is left
//! untouched until more bytes arrive.

use bytes::{Buf, BufMut, BytesMut};
use serde::{Serialize, de::DeserializeOwned};

use crate::ProtoError;

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Largest accepted frame body.
///
/// Holds a full room at the default limits (2500 messages of 4000
/// characters) even when every character takes four bytes of UTF-8.
pub const MAX_FRAME_SIZE: usize = 48 * 1024 * 1024;

/// Upper bound on the CBOR bytes a [`Message`](crate::Message) adds on top
/// of its body: field names, sender alias, timestamp and index.
pub const MESSAGE_ENCODING_OVERHEAD: usize = 128;

/// Upper bound on the bytes a response adds around its payload.
pub const RESPONSE_ENCODING_OVERHEAD: usize = 1024;

/// Append `value` as one frame to `dst`.
pub fn encode_frame<T: Serialize>(value: &T, dst: &mut BytesMut) -> Result<(), ProtoError> {
    let mut body = Vec::new();
    ciborium::into_writer(value, &mut body).map_err(|e| ProtoError::Encode(e.to_string()))?;

    if body.len() > MAX_FRAME_SIZE {
        return Err(ProtoError::FrameTooLarge { size: body.len(), max: MAX_FRAME_SIZE });
    }
    let len = u32::try_from(body.len())
        .map_err(|_| ProtoError::FrameTooLarge { size: body.len(), max: MAX_FRAME_SIZE })?;

    dst.reserve(LENGTH_PREFIX_SIZE + body.len());
    dst.put_u32(len);
    dst.put_slice(&body);
    Ok(())
}

/// Take one complete frame off the front of `src`.
///
/// Returns `Ok(None)` when `src` does not yet hold a whole frame.
pub fn decode_frame<T: DeserializeOwned>(src: &mut BytesMut) -> Result<Option<T>, ProtoError> {
    if src.len() < LENGTH_PREFIX_SIZE {
        return Ok(None);
    }

    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    prefix.copy_from_slice(&src[..LENGTH_PREFIX_SIZE]);
    let size = u32::from_be_bytes(prefix) as usize;

    if size > MAX_FRAME_SIZE {
        return Err(ProtoError::FrameTooLarge { size, max: MAX_FRAME_SIZE });
    }

    if src.len() < LENGTH_PREFIX_SIZE + size {
        src.reserve(LENGTH_PREFIX_SIZE + size - src.len());
        return Ok(None);
    }

    src.advance(LENGTH_PREFIX_SIZE);
    let body = src.split_to(size);
    let value = ciborium::from_reader(&body[..]).map_err(|e| ProtoError::Decode(e.to_string()))?;
    Ok(Some(value))
}
