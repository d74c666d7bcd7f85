//! Wire enumerations for the chat protocol
//!
//! Every enum travels as a little-endian `u32`. Request-side enums accept
//! any value (unrecognized ones are answered by the dispatcher); the
//! response kind is closed and rejects unknown values.

use crate::error::DecodeError;

/// Top-level request category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RequestKind {
    /// Chat text for everyone
    #[default]
    Message,
    /// A `/command` line
    Command,
    /// Housekeeping, namely registration
    Status,
    /// Unrecognized kind, kept so it can be answered
    Other(u32),
}

impl From<u32> for RequestKind {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::Message,
            1 => Self::Command,
            2 => Self::Status,
            other => Self::Other(other),
        }
    }
}

impl From<RequestKind> for u32 {
    fn from(kind: RequestKind) -> Self {
        match kind {
            RequestKind::Message => 0,
            RequestKind::Command => 1,
            RequestKind::Status => 2,
            RequestKind::Other(value) => value,
        }
    }
}

/// Command selected by the first token of a `/command` line
///
/// `0` on the wire means "not a command" and maps to `None` on the
/// request; every value above `2` collapses into `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Whisper,
    Ping,
    Unknown,
}

impl CommandKind {
    /// Look up a command by name (without the leading `/`)
    pub fn from_name(name: &str) -> Self {
        match name {
            "whisper" | "w" | "tell" | "msg" => Self::Whisper,
            "ping" => Self::Ping,
            _ => Self::Unknown,
        }
    }

    pub(crate) fn from_wire(value: u32) -> Option<Self> {
        match value {
            0 => None,
            1 => Some(Self::Whisper),
            2 => Some(Self::Ping),
            _ => Some(Self::Unknown),
        }
    }

    pub(crate) fn to_wire(kind: Option<Self>) -> u32 {
        match kind {
            None => 0,
            Some(Self::Whisper) => 1,
            Some(Self::Ping) => 2,
            Some(Self::Unknown) => 3,
        }
    }
}

/// Status request subtype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StatusKind {
    /// Bind the connection to a username
    #[default]
    Register,
    Other(u32),
}

impl From<u32> for StatusKind {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::Register,
            other => Self::Other(other),
        }
    }
}

impl From<StatusKind> for u32 {
    fn from(kind: StatusKind) -> Self {
        match kind {
            StatusKind::Register => 0,
            StatusKind::Other(value) => value,
        }
    }
}

/// Response category, which also decides its recipients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResponseKind {
    /// Chat text for every user
    #[default]
    Broadcast,
    /// Private message, delivered to sender and receiver
    Whisper,
    /// Server reply to a single user
    ServerPrivate,
    /// Server announcement to every user
    ServerAll,
    /// Tells the client the server is going away
    Terminate,
}

impl TryFrom<u32> for ResponseKind {
    type Error = DecodeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Broadcast),
            1 => Ok(Self::Whisper),
            2 => Ok(Self::ServerPrivate),
            3 => Ok(Self::ServerAll),
            4 => Ok(Self::Terminate),
            other => Err(DecodeError::UnknownResponseKind(other)),
        }
    }
}

impl From<ResponseKind> for u32 {
    fn from(kind: ResponseKind) -> Self {
        match kind {
            ResponseKind::Broadcast => 0,
            ResponseKind::Whisper => 1,
            ResponseKind::ServerPrivate => 2,
            ResponseKind::ServerAll => 3,
            ResponseKind::Terminate => 4,
        }
    }
}
