//! Server bootstrap and lifecycle
//!
//! Binds the listening socket, starts the dispatcher and the acceptor,
//! then lets the state monitor decide when to stop. Reaching a terminal
//! state runs the close sequence: stop accepting, close every
//! connection, close the command queue, release the socket.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::codec::ServerCodec;
use crate::config::Config;
use crate::error::AppError;
use crate::handler::handle_connection;
use crate::server::{ChatServer, ServerCommand};
use crate::state::{self, Monitor, ServerEvent, ServerState, StatusHandle};

/// A bound, not yet running, chat server
pub struct Server {
    config: Config,
    listener: TcpListener,
    local_addr: SocketAddr,
    status: StatusHandle,
    monitor: Monitor,
}

impl Server {
    /// Bind the listening socket
    ///
    /// A bind failure moves the lifecycle straight to `Error`.
    pub async fn bind(config: Config) -> Result<Self, AppError> {
        let (status, mut monitor) = state::channel();

        let listener = match TcpListener::bind(&config.bind_addr).await {
            Ok(listener) => listener,
            Err(source) => {
                let _ = monitor.apply(ServerEvent::Fault(format!(
                    "listener could not be created on {}: {}",
                    config.bind_addr, source
                )));
                return Err(AppError::Bind {
                    addr: config.bind_addr,
                    source,
                });
            }
        };
        let local_addr = listener.local_addr()?;

        Ok(Self {
            config,
            listener,
            local_addr,
            status,
            monitor,
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle for requesting shutdown or reporting faults
    pub fn shutdown_handle(&self) -> StatusHandle {
        self.status.clone()
    }

    /// Observe lifecycle changes
    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.monitor.subscribe()
    }

    /// Run until a terminal state, then tear everything down
    ///
    /// Returns `Ok` after a deliberate shutdown and `ServerFault` after
    /// `Error` or `Unknown`.
    pub async fn run(self) -> Result<(), AppError> {
        let Self {
            config,
            listener,
            local_addr,
            status,
            mut monitor,
        } = self;

        let shutdown = CancellationToken::new();
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);

        let dispatcher = tokio::spawn(ChatServer::new(cmd_rx, status.clone(), shutdown.clone()).run());
        let acceptor = tokio::spawn(accept_clients(
            listener,
            cmd_tx,
            status,
            shutdown.clone(),
            config.codec(),
        ));

        if let Err(e) = monitor.apply(ServerEvent::Listen) {
            warn!("{}", e);
        }
        info!("Listening on {}", local_addr);

        let final_state = monitor.run().await;

        // Close sequence
        info!("Closing server");
        shutdown.cancel();
        if let Err(e) = dispatcher.await {
            error!("Dispatcher task failed: {}", e);
        }
        if let Err(e) = acceptor.await {
            error!("Acceptor task failed: {}", e);
        }
        info!("Server closed");

        match final_state {
            ServerState::Closing => Ok(()),
            other => Err(AppError::ServerFault(
                monitor
                    .fault()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("stopped in state {other:?}")),
            )),
        }
    }
}

/// Acceptor: admits sockets until shutdown, then waits for their pumps
async fn accept_clients(
    listener: TcpListener,
    cmd_tx: mpsc::Sender<ServerCommand>,
    status: StatusHandle,
    shutdown: CancellationToken,
    codec: ServerCodec,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    info!("New connection from {}", peer);
                    let cmd_tx = cmd_tx.clone();
                    let codec = codec.clone();

                    connections.spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, cmd_tx, codec).await {
                            error!("Connection handler error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    status.fault(format!("listener accept failure: {e}"));
                    break;
                }
            },
        }
    }

    // Release the socket before waiting on the pumps.
    drop(listener);
    drop(cmd_tx);

    debug!("Acceptor stopped, {} connections draining", connections.len());
    while connections.join_next().await.is_some() {}
}
