//! Error types for the transport layer.

use std::io;

/// Errors returned by [`crate::Bridge`] operations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// `start` was called on a bridge whose receive loop already ran.
    #[error("bridge already started")]
    AlreadyStarted,

    /// A command was sent before the bridge was started.
    #[error("bridge not started")]
    NotStarted,

    /// A command was sent after the bridge was stopped.
    #[error("bridge stopped")]
    Stopped,

    /// Commands are single lines.
    #[error("command {0:?} contains a line break")]
    InvalidCommand(String),

    /// An I/O error occurred on the connection.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Failure to turn a single wire unit into a message.
///
/// These never end the session, the receive loop skips the unit.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The Content-Length header value could not be parsed as an integer.
    #[error("malformed Content-Length header value: {0:?}")]
    MalformedContentLength(String),

    /// The Content-Length header announced a body above [`crate::reader::MAX_FRAME_SIZE`].
    #[error("frame of {0} bytes exceeds the maximum frame size")]
    FrameTooLarge(usize),

    /// A header other than Content-Length was received.
    #[error("header {0:?} not implemented")]
    UnexpectedHeader(String),

    /// The message body contained invalid UTF-8.
    #[error("invalid UTF-8 in message body")]
    InvalidUtf8,

    /// Failed to deserialize the JSON message body.
    #[error("JSON deserialization failed: {0}")]
    Json(#[source] serde_json::Error),
}

/// Error produced while reading the next unit from the wire.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// The unit was malformed; the stream is still usable.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The connection failed.
    #[error("error reading from connection: {0}")]
    Io(#[from] io::Error),
}
