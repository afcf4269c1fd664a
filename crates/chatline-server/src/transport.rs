//! Framed request/response I/O over any async byte stream.
//!
//! The same functions drive tokio TCP streams in production, turmoil
//! streams in simulation and in-memory duplex pipes in tests.

use bytes::BytesMut;
use chatline_proto::{Request, Response, decode_frame, encode_frame};
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::ServerError;

/// Initial read buffer capacity.
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Read one frame, buffering partial reads in `buf`.
///
/// Returns `Ok(None)` on a clean end of stream between frames.
pub async fn read_frame<R, T>(reader: &mut R, buf: &mut BytesMut) -> Result<Option<T>, ServerError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    loop {
        if let Some(value) = decode_frame(buf)? {
            return Ok(Some(value));
        }

        if reader.read_buf(buf).await? == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(ServerError::Transport(format!(
                "connection closed with {} bytes of a partial frame",
                buf.len()
            )));
        }
    }
}

/// Write `value` as one frame and flush.
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<(), ServerError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut buf = BytesMut::new();
    encode_frame(value, &mut buf)?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Write `response`, or a `Response::Error` in its place if it cannot be
/// framed.
///
/// Only I/O failures are returned; the peer always gets an answer.
pub async fn write_response<W>(writer: &mut W, response: &Response) -> Result<(), ServerError>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::new();
    if let Err(e) = encode_frame(response, &mut buf) {
        tracing::warn!(error = %e, "response not sendable, answering with an error");
        buf.clear();
        encode_frame(&Response::Error { message: e.to_string() }, &mut buf)?;
    }
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Client side of a chat server connection.
///
/// Sends one request at a time and waits for its response.
pub struct ChatConnection<S> {
    stream: S,
    buf: BytesMut,
}

impl<S: AsyncRead + AsyncWrite + Unpin> ChatConnection<S> {
    /// Wrap a connected stream.
    pub fn new(stream: S) -> Self {
        Self { stream, buf: BytesMut::with_capacity(READ_BUFFER_SIZE) }
    }

    /// Send `request` and wait for the response.
    ///
    /// `Response::Error` is returned as a value, not as `Err`.
    pub async fn request(&mut self, request: &Request) -> Result<Response, ServerError> {
        write_frame(&mut self.stream, request).await?;
        read_frame(&mut self.stream, &mut self.buf)
            .await?
            .ok_or_else(|| ServerError::Transport("server closed the connection".to_string()))
    }

    /// Give back the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }
}
