//! Errors returned by the chat server.

use chatline_core::NetworkError;
use chatline_proto::ProtoError;
use thiserror::Error;

use crate::directory::DirectoryError;

/// Failures surfaced by request handling and the TCP listener.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid command-line or runtime settings
    #[error("configuration error: {0}")]
    Config(String),

    /// Socket I/O failed
    #[error("transport error: {0}")]
    Transport(String),

    /// Frame encoding or decoding failed
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtoError),

    /// The caller's address does not match the user's registration
    #[error("{username} is not authorized from this address")]
    Unauthorized {
        /// User the request claimed to act as.
        username: String,
    },

    /// Contract network error
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// User directory error
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
