//! Error types for the chat relay
//!
//! Split by fault class: wire decoding, framing, registry bookkeeping,
//! lifecycle transitions, configuration, plus the top-level `AppError`.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::state::{ServerEvent, ServerState};

/// Malformed payload inside a frame
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload ended before a declared field did
    #[error("truncated payload: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// A string field is not valid UTF-8
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    /// Response kind outside the known range
    #[error("unknown response kind: {0}")]
    UnknownResponseKind(u32),

    /// Bytes left over after the last field
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
}

/// Framing errors raised by `FrameCodec`
#[derive(Debug, Error)]
pub enum CodecError {
    /// Declared frame length exceeds the configured limit
    #[error("frame of {length} bytes exceeds maximum of {max}")]
    FrameTooLarge { length: usize, max: usize },

    /// Payload could not be decoded (protocol fault)
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Transport error (fatal for the connection)
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Registry bookkeeping errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Another live connection already holds this name
    #[error("Username {0} is already taken")]
    UsernameTaken(String),

    /// The connection registered before; names are immutable
    #[error("Already registered as {username}")]
    AlreadyRegistered { addr: String, username: String },

    /// No live connection has this address
    #[error("no connection with address {0}")]
    UnknownAddress(String),

    /// A live connection already uses this address
    #[error("address {0} is already connected")]
    DuplicateAddress(String),

    /// Registration with an empty name
    #[error("Username cannot be empty")]
    EmptyUsername,

    /// Registration with a name over the length limit
    #[error("Username must be {max} characters or less")]
    UsernameTooLong { max: usize },
}

/// An event that is not legal in the current lifecycle state
#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal transition: {event:?} in state {state:?}")]
pub struct TransitionError {
    pub state: ServerState,
    pub event: ServerEvent,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for `Config`
    #[error("invalid config file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Application-level errors
///
/// Connection-scoped faults (`Io`, `Codec`) end one connection; the
/// remaining variants are server faults and end the process.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing or decoding error
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// Listening socket could not be bound
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Username rejected before connecting
    #[error("Username invalid: {0}")]
    Username(#[from] UsernameError),

    /// The server stopped in the `Error` or `Unknown` state
    #[error("server fault: {0}")]
    ServerFault(String),
}

/// Outbound queue send errors
///
/// Occurs when enqueueing onto a connection whose writer has stopped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}

/// Client-side username validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsernameError {
    #[error("username cannot be empty")]
    Empty,

    #[error("username must be {max} characters or less")]
    TooLong { max: usize },
}
