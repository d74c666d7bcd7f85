//! Connection struct definition
//!
//! Represents one live socket as seen by the registry: its address, its
//! username once registered, and the sending half of its outbound queue.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::SendError;
use crate::message::Response;

/// A live client connection
///
/// Dropping a `Connection` closes its outbound queue and cancels its
/// transport token. The reader stops at once; the writer abandons any
/// blocked write, flushes what is left within [`FLUSH_GRACE`] and shuts the
/// socket down. Since the registry is the only owner, both happen
/// exactly once.
///
/// [`FLUSH_GRACE`]: crate::handler::FLUSH_GRACE
#[derive(Debug)]
pub struct Connection {
    /// Peer address assigned at accept time
    addr: String,
    /// Username (None before registration)
    username: Option<String>,
    /// Server → Client response queue
    outbound: mpsc::UnboundedSender<Response>,
    /// Cancelled when the connection is closed
    transport: CancellationToken,
}

impl Connection {
    /// Create a new connection with the given address and queue
    pub fn new(
        addr: impl Into<String>,
        outbound: mpsc::UnboundedSender<Response>,
        transport: CancellationToken,
    ) -> Self {
        Self {
            addr: addr.into(),
            username: None,
            outbound,
            transport,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Whether this connection is registered as `name`
    pub fn is_named(&self, name: &str) -> bool {
        self.username.as_deref() == Some(name)
    }

    /// Get the display name for this connection
    ///
    /// Returns the username if set, otherwise the address.
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.addr)
    }

    /// Bind a username; the registry enforces that this happens once.
    pub(crate) fn set_username(&mut self, username: String) {
        self.username = Some(username);
    }

    /// Enqueue a response for this connection's writer
    ///
    /// Never blocks. Returns an error if the writer has already stopped.
    pub fn send(&self, res: Response) -> Result<(), SendError> {
        self.outbound.send(res).map_err(|_| SendError::ChannelClosed)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.transport.cancel();
    }
}
