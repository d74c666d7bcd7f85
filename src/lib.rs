//! TCP Chat Relay Library
//!
//! Clients connect over TCP, register a display name, and send chat text
//! or `/commands`. The server fans each message out by its addressing
//! rule: broadcast, private whisper, or a server reply to one user.
//!
//! # Protocol
//! Requests and responses use a positional binary layout (little-endian
//! `u32` enums, length-prefixed UTF-8 strings), each wrapped in a
//! `u32` length-prefixed frame. See [`codec`].
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the dispatcher; it owns the connection `Registry`
//!   and consumes every request in arrival order
//! - Each connection has a reader and a writer task (`handler`)
//! - `router` picks the recipients of each response
//! - `state::Monitor` drives the `Idle → Listening → Closing/Error`
//!   lifecycle and triggers teardown
//!
//! # Example
//! ```ignore
//! use chatroom::{Config, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(Config::default()).await?;
//!     let shutdown = server.shutdown_handle();
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         shutdown.shutdown();
//!     });
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod listener;
pub mod message;
pub mod registry;
pub mod router;
pub mod server;
pub mod state;
pub mod types;

// Re-export main types for convenience
pub use client::ChatClient;
pub use codec::{ClientCodec, FrameCodec, ServerCodec, WireFormat};
pub use config::Config;
pub use connection::Connection;
pub use error::{AppError, CodecError, DecodeError, RegistryError, SendError};
pub use handler::handle_connection;
pub use listener::Server;
pub use message::{Request, Response};
pub use registry::Registry;
pub use server::{ChatServer, ServerCommand};
pub use state::{ServerEvent, ServerState, StatusHandle};
pub use types::{CommandKind, RequestKind, ResponseKind, StatusKind};
