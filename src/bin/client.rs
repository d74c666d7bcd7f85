//! TCP Chat Relay - Client Entry Point
//!
//! Usage: `chatroom-client [username] [addr]`. Prompts for a username
//! when none is given.

use std::env;
use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use chatroom::client::validate_username;
use chatroom::config::DEFAULT_ADDR;
use chatroom::ChatClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so chat output stays readable
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chatroom=warn")),
        )
        .init();

    let mut args = env::args().skip(1);
    let mut input = BufReader::new(tokio::io::stdin());

    let username = match args.next() {
        Some(name) => name,
        None => prompt_username(&mut input).await?,
    };
    let addr = args.next().unwrap_or_else(|| DEFAULT_ADDR.to_string());

    let client = ChatClient::connect(&addr, username).await?;
    println!("Connected to {} as {}", addr, client.username());

    client.run(input, tokio::io::stdout()).await?;
    Ok(())
}

/// Ask until a valid username is entered
async fn prompt_username<R: AsyncBufRead + Unpin>(input: &mut R) -> io::Result<String> {
    loop {
        println!("Enter username: ");

        let mut line = String::new();
        if input.read_line(&mut line).await? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no username given"));
        }

        let name = line.trim_end_matches(['\r', '\n']);
        match validate_username(name) {
            Ok(()) => return Ok(name.to_string()),
            Err(e) => println!("Username invalid: {}", e),
        }
    }
}
