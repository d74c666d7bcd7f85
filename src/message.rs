//! Request/response values exchanged over the wire
//!
//! Requests travel client → server, responses server → client. The
//! binary layout lives in `codec`; this module covers parsing user input
//! into requests and rendering responses for display.

use crate::types::{CommandKind, RequestKind, ResponseKind, StatusKind};

/// Client → Server request
///
/// `origin` is the peer address stamped by the connection reader. It is
/// never part of the wire format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub kind: RequestKind,
    /// Set when `kind` is `Command`
    pub command: Option<CommandKind>,
    /// Meaningful when `kind` is `Status`
    pub status: StatusKind,
    pub sender: String,
    pub receiver: String,
    pub content: String,
    pub origin: String,
}

impl Request {
    /// Parse a line of user input
    ///
    /// A line starting with `/` is a command. The first token picks the
    /// command; for a whisper the second token is the receiver and the
    /// rest of the line is the content. Missing tokens leave the fields
    /// empty. Any other line is chat text.
    pub fn parse(line: &str) -> Self {
        let Some(command_line) = line.strip_prefix('/') else {
            return Self {
                kind: RequestKind::Message,
                content: line.to_string(),
                ..Default::default()
            };
        };

        let mut tokens = command_line.splitn(3, ' ');
        let command = CommandKind::from_name(tokens.next().unwrap_or_default());

        let mut req = Self {
            kind: RequestKind::Command,
            command: Some(command),
            ..Default::default()
        };

        if command == CommandKind::Whisper {
            req.receiver = tokens.next().unwrap_or_default().to_string();
            req.content = tokens.next().unwrap_or_default().to_string();
        }

        req
    }

    /// Registration request binding the connection to `username`
    pub fn register(username: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::Status,
            status: StatusKind::Register,
            sender: username.into(),
            ..Default::default()
        }
    }

    /// Whether this is a `Status/Register` request
    pub fn is_register(&self) -> bool {
        self.kind == RequestKind::Status && self.status == StatusKind::Register
    }
}

/// Server → Client response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub kind: ResponseKind,
    pub sender: String,
    pub receiver: String,
    pub content: String,
}

impl Response {
    /// Server reply addressed to one user
    pub fn server_private(receiver: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: ResponseKind::ServerPrivate,
            receiver: receiver.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    /// Server announcement for every user
    pub fn server_all(content: impl Into<String>) -> Self {
        Self {
            kind: ResponseKind::ServerAll,
            content: content.into(),
            ..Default::default()
        }
    }

    /// Shutdown notice sent during the close sequence
    pub fn terminate() -> Self {
        Self {
            kind: ResponseKind::Terminate,
            content: "Server is shutting down".to_string(),
            ..Default::default()
        }
    }

    /// Render this response for the user named `me`
    ///
    /// Returns `None` when there is nothing to show, e.g. a whisper that
    /// involves neither side, or a terminate notice.
    pub fn render(&self, me: &str) -> Option<String> {
        match self.kind {
            ResponseKind::Broadcast => Some(format!("{}: {}", self.sender, self.content)),
            ResponseKind::Whisper if self.receiver == me => {
                Some(format!("from {}: {}", self.sender, self.content))
            }
            ResponseKind::Whisper if self.sender == me => {
                Some(format!("to {}: {}", self.receiver, self.content))
            }
            ResponseKind::Whisper => None,
            ResponseKind::ServerPrivate => Some(format!("from SERVER: {}", self.content)),
            ResponseKind::ServerAll => Some(format!("SERVER: {}", self.content)),
            ResponseKind::Terminate => None,
        }
    }
}
