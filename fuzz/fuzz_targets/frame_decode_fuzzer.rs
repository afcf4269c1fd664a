//! Fuzz target for request/response frame decoding
//!
//! The server decodes whatever a peer sends. Feed raw bytes, delivered in
//! arbitrary chunk sizes, through the length-prefixed CBOR decoder.
//!
//! # Invariants
//!
//! - NEVER panic on malformed input
//! - Oversized length prefixes are rejected before buffering the body
//! - A decoded request re-encodes and decodes to the same value
//! - Chunking does not change what is decoded

#![no_main]

use arbitrary::Arbitrary;
use bytes::BytesMut;
use chatline_proto::{MAX_FRAME_SIZE, ProtoError, Request, Response, decode_frame, encode_frame};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    data: Vec<u8>,
    chunk_sizes: Vec<u8>,
    as_response: bool,
}

/// Decode every frame in `data`, fed `chunk_sizes` bytes at a time.
fn decode_all<T: serde::de::DeserializeOwned>(
    data: &[u8],
    chunk_sizes: &[u8],
) -> (Vec<T>, Option<ProtoError>) {
    let mut buf = BytesMut::new();
    let mut decoded = Vec::new();
    let mut offset = 0;
    let mut chunks = chunk_sizes.iter().copied().cycle();

    while offset < data.len() {
        let size = chunks.next().map_or(data.len(), |c| usize::from(c).max(1));
        let end = (offset + size).min(data.len());
        buf.extend_from_slice(&data[offset..end]);
        offset = end;

        loop {
            match decode_frame::<T>(&mut buf) {
                Ok(Some(value)) => decoded.push(value),
                Ok(None) => break,
                Err(e) => return (decoded, Some(e)),
            }
        }
    }
    (decoded, None)
}

fuzz_target!(|input: FuzzInput| {
    if input.as_response {
        let _ = decode_all::<Response>(&input.data, &input.chunk_sizes);
        return;
    }

    let (chunked, chunked_err) = decode_all::<Request>(&input.data, &input.chunk_sizes);
    let (whole, whole_err) = decode_all::<Request>(&input.data, &[]);
    assert_eq!(chunked, whole, "chunking changed decoded requests");
    assert_eq!(chunked_err.is_some(), whole_err.is_some());

    if let Some(ProtoError::FrameTooLarge { size, max }) = whole_err {
        assert!(size > max);
        assert_eq!(max, MAX_FRAME_SIZE);
    }

    for request in whole {
        let mut buf = BytesMut::new();
        encode_frame(&request, &mut buf).expect("decoded request must re-encode");
        let again = decode_frame::<Request>(&mut buf).expect("re-encoded request must decode");
        assert_eq!(again, Some(request));
        assert!(buf.is_empty());
    }
});
