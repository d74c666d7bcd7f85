//! ChatServer actor implementation
//!
//! The request dispatcher. It owns the connection registry outright and
//! is the only consumer of the shared command queue, so every registry
//! mutation and every request is processed in one total arrival order.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::connection::Connection;
use crate::error::RegistryError;
use crate::message::{Request, Response};
use crate::registry::{quoted_name, Registry};
use crate::router;
use crate::state::StatusHandle;
use crate::types::{CommandKind, RequestKind, ResponseKind, StatusKind};

/// Commands sent from connection pumps to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// New connection accepted
    Connect { conn: Connection },
    /// Decoded request, stamped with its origin address
    Request(Request),
    /// A pump stopped; remove the connection at `addr`
    Disconnect { addr: String },
}

/// The dispatcher actor
pub struct ChatServer {
    /// All live connections
    registry: Registry,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
    /// Lifecycle fault reporting
    status: StatusHandle,
    /// Server-wide shutdown
    shutdown: CancellationToken,
}

impl ChatServer {
    /// Create a new ChatServer with the given command receiver
    pub fn new(
        receiver: mpsc::Receiver<ServerCommand>,
        status: StatusHandle,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry: Registry::new(),
            receiver,
            status,
            shutdown,
        }
    }

    /// Run the ChatServer event loop
    ///
    /// Processes commands until shutdown or until all senders are
    /// dropped, then closes every remaining connection.
    pub async fn run(mut self) {
        info!("ChatServer started");

        loop {
            let cmd = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => cmd,
                    None => break,
                },
            };
            self.handle_command(cmd);
        }

        self.close_all();
        info!("ChatServer shutting down");
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect { conn } => self.handle_connect(conn),
            ServerCommand::Request(req) => self.handle_request(req),
            ServerCommand::Disconnect { addr } => self.handle_disconnect(&addr),
        }
    }

    fn handle_connect(&mut self, conn: Connection) {
        let addr = conn.addr().to_string();
        if let Err(e) = self.registry.add(conn) {
            error!("Registry fault: {}", e);
            self.status.fault(format!("registry fault: {e}"));
            return;
        }
        info!("Client connected: {}", addr);
        debug!("Total connections: {}", self.registry.len());
    }

    fn handle_request(&mut self, req: Request) {
        debug!("request: type {:?} from {}", req.kind, req.sender);

        if req.is_register() && !self.register(&req) {
            return;
        }

        let res = build_response(&req);
        let delivered = router::route(&self.registry, res);
        debug!("Response delivered to {} connections", delivered);
    }

    /// Bind the request's origin to its sender name
    ///
    /// Returns false when the registration was refused; the refusal has
    /// already been answered to the origin connection.
    fn register(&mut self, req: &Request) -> bool {
        let err = match self.registry.register(&req.origin, &req.sender) {
            Ok(conn) => {
                info!(
                    "Registered user (username = {}, address = {})",
                    req.sender,
                    conn.addr()
                );
                return true;
            }
            Err(RegistryError::UnknownAddress(addr)) => {
                debug!("Registration from departed connection {}", addr);
                return false;
            }
            Err(e) => e,
        };

        warn!("Registration refused for {}: {}", req.origin, err);
        if let Some(conn) = self.registry.get(&req.origin) {
            let _ = conn.send(Response::server_private(
                quoted_name(&req.sender),
                err.to_string(),
            ));
        }
        false
    }

    fn handle_disconnect(&mut self, addr: &str) {
        // Both pumps report; the second report finds nothing.
        let Some(conn) = self.registry.remove(addr) else {
            return;
        };

        let username = conn.username().map(str::to_string);
        info!(
            "Client (username = {}, address = {}) disconnected",
            username.as_deref().unwrap_or(""),
            addr
        );
        drop(conn);

        if let Some(name) = username {
            router::route(
                &self.registry,
                Response::server_all(format!("{name} has disconnected")),
            );
        }
    }

    /// Tell every connection the server is going away, then close it
    fn close_all(&mut self) {
        let count = self.registry.len();
        for conn in self.registry.drain() {
            let _ = conn.send(Response::terminate());
        }
        debug!("Closed {} connections", count);
    }
}

/// Build the single response owed for a request
pub fn build_response(req: &Request) -> Response {
    match req.kind {
        RequestKind::Message => Response {
            kind: ResponseKind::Broadcast,
            sender: req.sender.clone(),
            receiver: String::new(),
            content: req.content.clone(),
        },
        RequestKind::Command => build_command_response(req),
        RequestKind::Status => build_status_response(req),
        RequestKind::Other(_) => Response::server_private(&req.sender, "Invalid request"),
    }
}

fn build_command_response(req: &Request) -> Response {
    match req.command {
        Some(CommandKind::Whisper) => Response {
            kind: ResponseKind::Whisper,
            sender: req.sender.clone(),
            receiver: req.receiver.clone(),
            content: req.content.clone(),
        },
        Some(CommandKind::Ping) => Response::server_private(&req.sender, "Pong!"),
        Some(CommandKind::Unknown) | None => {
            Response::server_private(&req.sender, "Unknown command")
        }
    }
}

fn build_status_response(req: &Request) -> Response {
    match req.status {
        StatusKind::Register => Response {
            sender: req.sender.clone(),
            ..Response::server_all(format!("{} has connected", req.sender))
        },
        StatusKind::Other(_) => Response::server_private(&req.sender, "Unknown command"),
    }
}
