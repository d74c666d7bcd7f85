//! TCP connection handler
//!
//! Admits an accepted socket into the registry and runs its two pumps:
//! the reader turns frames into requests for the dispatcher, the writer
//! drains the outbound queue onto the socket. Either pump stopping
//! reports the connection for removal.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::ServerCodec;
use crate::connection::Connection;
use crate::error::{AppError, CodecError};
use crate::message::Response;
use crate::server::ServerCommand;

/// How long a closed connection may spend writing what was queued before
/// it closed
pub const FLUSH_GRACE: Duration = Duration::from_secs(1);

/// Handle a new TCP connection
///
/// Registers the connection with the ChatServer, then runs the reader
/// and writer until both have stopped. Both pumps stop once the
/// `Connection` is dropped, which happens on removal and on shutdown.
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    cmd_tx: mpsc::Sender<ServerCommand>,
    codec: ServerCodec,
) -> Result<(), AppError> {
    let addr = peer.to_string();
    let transport = CancellationToken::new();

    // Create channel for server -> client responses
    let (res_tx, res_rx) = mpsc::unbounded_channel::<Response>();

    // Register before the reader starts so requests never precede Connect.
    cmd_tx
        .send(ServerCommand::Connect {
            conn: Connection::new(addr.clone(), res_tx, transport.clone()),
        })
        .await
        .map_err(|_| AppError::ChannelSend)?;

    let (read_half, write_half) = stream.into_split();
    let reader = FramedRead::new(read_half, codec.clone());
    let writer = FramedWrite::new(write_half, codec);

    let read_task = tokio::spawn(read_requests(
        addr.clone(),
        reader,
        cmd_tx.clone(),
        transport.clone(),
    ));
    let write_task = tokio::spawn(write_responses(
        addr.clone(),
        writer,
        res_rx,
        cmd_tx,
        transport,
    ));

    let (read_result, write_result) = tokio::join!(read_task, write_task);
    if let Err(e) = read_result {
        warn!("Read task for {} failed: {}", addr, e);
    }
    if let Err(e) = write_result {
        warn!("Write task for {} failed: {}", addr, e);
    }

    info!("Connection {} closed", addr);
    Ok(())
}

/// Reader pump: socket → dispatcher
async fn read_requests(
    addr: String,
    mut reader: FramedRead<OwnedReadHalf, ServerCodec>,
    cmd_tx: mpsc::Sender<ServerCommand>,
    transport: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = transport.cancelled() => {
                debug!("Transport closed for {}", addr);
                break;
            }
            frame = reader.next() => frame,
        };

        match frame {
            Some(Ok(mut req)) => {
                req.origin = addr.clone();
                if cmd_tx.send(ServerCommand::Request(req)).await.is_err() {
                    debug!("Server closed, ending read task for {}", addr);
                    return;
                }
            }
            Some(Err(e)) => {
                warn!("Dropping {}: {}", addr, e);
                break;
            }
            None => {
                debug!("{} closed the connection", addr);
                break;
            }
        }
    }

    let _ = cmd_tx.send(ServerCommand::Disconnect { addr }).await;
}

/// Writer pump: outbound queue → socket
///
/// A write blocked on a peer that stopped reading is abandoned as soon as
/// the transport closes. Responses queued before the close get at most
/// `FLUSH_GRACE` to reach the socket.
async fn write_responses(
    addr: String,
    mut writer: FramedWrite<OwnedWriteHalf, ServerCodec>,
    mut res_rx: mpsc::UnboundedReceiver<Response>,
    cmd_tx: mpsc::Sender<ServerCommand>,
    transport: CancellationToken,
) {
    let mut healthy = true;

    loop {
        let res = tokio::select! {
            _ = transport.cancelled() => break,
            res = res_rx.recv() => match res {
                Some(res) => res,
                None => break,
            },
        };

        let sent = tokio::select! {
            _ = transport.cancelled() => break,
            sent = writer.send(res) => sent,
        };
        if let Err(e) = sent {
            warn!("Write to {} failed: {}", addr, e);
            healthy = false;
            break;
        }
    }

    if healthy {
        match timeout(FLUSH_GRACE, flush_and_close(&mut writer, &mut res_rx)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Final flush to {} failed: {}", addr, e),
            Err(_) => warn!("{} is not reading, dropping unsent responses", addr),
        }
    }
    debug!("Write task ended for {}", addr);

    let _ = cmd_tx.send(ServerCommand::Disconnect { addr }).await;
}

/// Write whatever is still queued, then shut down the write half
async fn flush_and_close(
    writer: &mut FramedWrite<OwnedWriteHalf, ServerCodec>,
    res_rx: &mut mpsc::UnboundedReceiver<Response>,
) -> Result<(), CodecError> {
    while let Ok(res) = res_rx.try_recv() {
        writer.feed(res).await?;
    }
    writer.close().await
}
