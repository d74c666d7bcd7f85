//! Terminal chat client
//!
//! Connects, registers its username, then relays input lines to the
//! server as requests and prints each response it receives.

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, info};

use crate::codec::ClientCodec;
use crate::error::{AppError, UsernameError};
use crate::message::Request;
use crate::types::ResponseKind;

pub use crate::registry::MAX_USERNAME_LEN;

/// Check a username before connecting
pub fn validate_username(name: &str) -> Result<(), UsernameError> {
    if name.is_empty() {
        return Err(UsernameError::Empty);
    }
    if name.chars().count() > MAX_USERNAME_LEN {
        return Err(UsernameError::TooLong {
            max: MAX_USERNAME_LEN,
        });
    }
    Ok(())
}

/// A registered connection to the chat server
pub struct ChatClient {
    username: String,
    framed: Framed<TcpStream, ClientCodec>,
}

impl ChatClient {
    /// Connect to `addr` and register as `username`
    pub async fn connect(addr: &str, username: impl Into<String>) -> Result<Self, AppError> {
        let username = username.into();
        validate_username(&username)?;

        let stream = TcpStream::connect(addr).await?;
        let mut framed = Framed::new(stream, ClientCodec::default());
        framed.send(Request::register(username.clone())).await?;
        info!("Connected to {} as {}", addr, username);

        Ok(Self { username, framed })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Relay `input` lines to the server and render responses to `output`
    ///
    /// Ends when input is exhausted, the server closes the connection, or
    /// the server announces shutdown.
    pub async fn run<R, W>(self, input: R, mut output: W) -> Result<(), AppError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let Self { username, framed } = self;
        let (mut sink, mut stream) = framed.split();
        let mut lines = input.lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        debug!("Input closed");
                        break;
                    };
                    let mut req = Request::parse(&line);
                    req.sender = username.clone();
                    sink.send(req).await?;
                }
                res = stream.next() => {
                    let Some(res) = res else {
                        debug!("Server closed the connection");
                        break;
                    };
                    let res = res?;
                    if res.kind == ResponseKind::Terminate {
                        output.write_all(format!("SERVER: {}\n", res.content).as_bytes()).await?;
                        break;
                    }
                    if let Some(text) = res.render(&username) {
                        output.write_all(format!("{text}\n").as_bytes()).await?;
                    }
                }
            }
            output.flush().await?;
        }

        output.flush().await?;
        let _ = sink.close().await;
        Ok(())
    }
}
