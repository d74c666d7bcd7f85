//! Connection registry
//!
//! The authoritative set of live connections. Entries are unique by
//! address and, once registered, by username. Removal swaps the last
//! entry into the vacated slot, so iteration order is not meaningful.

use std::borrow::Cow;

use tracing::debug;

use crate::connection::Connection;
use crate::error::RegistryError;

/// Longest username the server accepts, in characters
pub const MAX_USERNAME_LEN: usize = 8;

/// A name as quoted back in server messages
///
/// Anything longer than a username can be is cut to `MAX_USERNAME_LEN`
/// characters and marked with `...`.
pub fn quoted_name(name: &str) -> Cow<'_, str> {
    match name.char_indices().nth(MAX_USERNAME_LEN) {
        Some((end, _)) => Cow::Owned(format!("{}...", &name[..end])),
        None => Cow::Borrowed(name),
    }
}

/// Live connections, owned by the dispatcher actor
#[derive(Debug, Default)]
pub struct Registry {
    connections: Vec<Connection>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a freshly accepted connection
    pub fn add(&mut self, conn: Connection) -> Result<(), RegistryError> {
        if self.get(conn.addr()).is_some() {
            return Err(RegistryError::DuplicateAddress(conn.addr().to_string()));
        }
        self.connections.push(conn);
        Ok(())
    }

    /// Bind `username` to the connection at `addr`
    ///
    /// Fails if the name is empty, longer than `MAX_USERNAME_LEN`
    /// characters or held by another live connection, and if the
    /// connection already has a name.
    pub fn register(&mut self, addr: &str, username: &str) -> Result<&Connection, RegistryError> {
        if username.is_empty() {
            return Err(RegistryError::EmptyUsername);
        }
        if username.chars().count() > MAX_USERNAME_LEN {
            return Err(RegistryError::UsernameTooLong {
                max: MAX_USERNAME_LEN,
            });
        }

        if self.by_username(username).is_some_and(|c| c.addr() != addr) {
            return Err(RegistryError::UsernameTaken(username.to_string()));
        }

        let conn = self
            .connections
            .iter_mut()
            .find(|c| c.addr() == addr)
            .ok_or_else(|| RegistryError::UnknownAddress(addr.to_string()))?;

        if let Some(existing) = conn.username() {
            return Err(RegistryError::AlreadyRegistered {
                addr: addr.to_string(),
                username: existing.to_string(),
            });
        }

        conn.set_username(username.to_string());
        Ok(conn)
    }

    /// Remove the connection at `addr`
    ///
    /// The returned connection closes its queue and transport when
    /// dropped. Returns `None` if it was already removed.
    pub fn remove(&mut self, addr: &str) -> Option<Connection> {
        let index = self.connections.iter().position(|c| c.addr() == addr)?;
        let conn = self.connections.swap_remove(index);
        debug!("Removed {} ({} left)", conn.display_name(), self.connections.len());
        Some(conn)
    }

    /// Remove the connection registered as `username`
    pub fn remove_user(&mut self, username: &str) -> Option<Connection> {
        let addr = self.by_username(username)?.addr().to_string();
        self.remove(&addr)
    }

    /// Look up a connection by address
    pub fn get(&self, addr: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.addr() == addr)
    }

    /// Look up a connection by registered username
    pub fn by_username(&self, username: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.is_named(username))
    }

    /// All live connections, registered or not
    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter()
    }

    /// Take every connection out of the registry
    pub fn drain(&mut self) -> impl Iterator<Item = Connection> + '_ {
        self.connections.drain(..)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
