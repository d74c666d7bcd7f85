//! TCP Chat Relay - Server Entry Point
//!
//! Loads configuration, binds the listener and runs the server until
//! Ctrl-C or a fatal fault.

use std::env;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chatroom::{Config, Server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chatroom=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chatroom=info")),
        )
        .init();

    // Config file from CHATROOM_CONFIG, bind address from command line
    let mut config = Config::from_env()?;
    if let Some(addr) = env::args().nth(1) {
        config.bind_addr = addr;
    }

    let server = Server::bind(config).await?;
    info!("Chat server bound to {}", server.local_addr());

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received");
                shutdown.shutdown();
            }
            Err(e) => error!("Cannot listen for Ctrl-C: {}", e),
        }
    });

    server.run().await?;
    Ok(())
}
