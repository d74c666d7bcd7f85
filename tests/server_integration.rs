//! End-to-end tests: a real server on an ephemeral port, driven by
//! framed TCP clients.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::Framed;

use chatroom::{
    AppError, ClientCodec, Config, Request, Response, ResponseKind, Server, StatusHandle,
};

const WAIT: Duration = Duration::from_secs(5);

type Client = Framed<TcpStream, ClientCodec>;

async fn start_server() -> (String, StatusHandle, JoinHandle<Result<(), AppError>>) {
    let config = Config {
        bind_addr: "127.0.0.1:0".to_string(),
        ..Config::default()
    };
    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().to_string();
    let handle = server.shutdown_handle();
    (addr, handle, tokio::spawn(server.run()))
}

async fn recv(client: &mut Client) -> Response {
    timeout(WAIT, client.next())
        .await
        .expect("timed out waiting for a response")
        .expect("connection closed")
        .expect("malformed response")
}

async fn send(client: &mut Client, sender: &str, line: &str) {
    let mut req = Request::parse(line);
    req.sender = sender.to_string();
    client.send(req).await.unwrap();
}

/// Connect and register; returns once the server has announced us.
async fn join(addr: &str, name: &str) -> Client {
    let stream = TcpStream::connect(addr).await.unwrap();
    let mut client = Framed::new(stream, ClientCodec::default());
    client.send(Request::register(name)).await.unwrap();

    let res = recv(&mut client).await;
    assert_eq!(res.kind, ResponseKind::ServerAll);
    assert_eq!(res.content, format!("{name} has connected"));
    client
}

/// Three users, each having seen every later arrival.
async fn room(addr: &str) -> (Client, Client, Client) {
    let mut a = join(addr, "A").await;
    let mut b = join(addr, "B").await;
    assert_eq!(recv(&mut a).await.content, "B has connected");
    let c = join(addr, "C").await;
    assert_eq!(recv(&mut a).await.content, "C has connected");
    assert_eq!(recv(&mut b).await.content, "C has connected");
    (a, b, c)
}

/// Ping from `client` and expect the pong next, proving nothing else
/// was queued for it in between.
async fn assert_nothing_pending(client: &mut Client, name: &str) {
    send(client, name, "/ping").await;
    assert_eq!(recv(client).await, Response::server_private(name, "Pong!"));
}

#[tokio::test]
async fn broadcast_reaches_every_user_once() {
    let (addr, shutdown, server) = start_server().await;
    let (mut a, mut b, mut c) = room(&addr).await;

    send(&mut a, "A", "hello everyone").await;

    for (client, name) in [(&mut a, "A"), (&mut b, "B"), (&mut c, "C")] {
        let res = recv(client).await;
        assert_eq!(res.kind, ResponseKind::Broadcast);
        assert_eq!(res.sender, "A");
        assert_eq!(res.content, "hello everyone");
        assert_nothing_pending(client, name).await;
    }

    shutdown.shutdown();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn whisper_reaches_only_both_parties() {
    let (addr, shutdown, server) = start_server().await;
    let (mut a, mut b, mut c) = room(&addr).await;

    send(&mut a, "A", "/whisper B hello").await;

    let expected = Response {
        kind: ResponseKind::Whisper,
        sender: "A".into(),
        receiver: "B".into(),
        content: "hello".into(),
    };
    assert_eq!(recv(&mut a).await, expected);
    assert_eq!(recv(&mut b).await, expected);
    assert_nothing_pending(&mut c, "C").await;

    shutdown.shutdown();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn whisper_to_unknown_user_answers_sender_only() {
    let (addr, shutdown, server) = start_server().await;
    let (mut a, mut b, _c) = room(&addr).await;

    send(&mut a, "A", "/whisper Z hi").await;

    let res = recv(&mut a).await;
    assert_eq!(res.kind, ResponseKind::ServerPrivate);
    assert_eq!(res.content, "User Z does not exist");
    assert_nothing_pending(&mut b, "B").await;

    shutdown.shutdown();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn unknown_command_is_answered_privately() {
    let (addr, shutdown, server) = start_server().await;
    let mut a = join(&addr, "A").await;

    send(&mut a, "A", "/dance").await;
    assert_eq!(
        recv(&mut a).await,
        Response::server_private("A", "Unknown command")
    );

    shutdown.shutdown();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn duplicate_username_is_refused() {
    let (addr, shutdown, server) = start_server().await;
    let mut a = join(&addr, "A").await;

    let stream = TcpStream::connect(&addr).await.unwrap();
    let mut impostor = Framed::new(stream, ClientCodec::default());
    impostor.send(Request::register("A")).await.unwrap();

    assert_eq!(
        recv(&mut impostor).await,
        Response::server_private("A", "Username A is already taken")
    );
    assert_nothing_pending(&mut a, "A").await;

    shutdown.shutdown();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn disconnect_is_announced_to_remaining_users() {
    let (addr, shutdown, server) = start_server().await;
    let (a, mut b, mut c) = room(&addr).await;

    drop(a);

    for client in [&mut b, &mut c] {
        assert_eq!(
            recv(client).await,
            Response::server_all("A has disconnected")
        );
    }

    // The name is free again.
    let mut again = join(&addr, "A").await;
    assert_nothing_pending(&mut again, "A").await;

    shutdown.shutdown();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn requests_split_across_writes_are_reassembled() {
    use bytes::BytesMut;
    use chatroom::WireFormat;
    use tokio::io::AsyncWriteExt;

    let (addr, shutdown, server) = start_server().await;

    let mut payload = BytesMut::new();
    Request::register("S").encode(&mut payload);
    let mut frame = (payload.len() as u32).to_le_bytes().to_vec();
    frame.extend_from_slice(&payload);

    let mut stream = TcpStream::connect(&addr).await.unwrap();
    for chunk in frame.chunks(3) {
        stream.write_all(chunk).await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let mut client = Framed::new(stream, ClientCodec::default());
    assert_eq!(recv(&mut client).await.content, "S has connected");

    shutdown.shutdown();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn malformed_frame_drops_only_that_connection() {
    use tokio::io::AsyncWriteExt;

    let (addr, shutdown, server) = start_server().await;
    let (_a, mut b, _c) = room(&addr).await;

    let mut rogue = TcpStream::connect(&addr).await.unwrap();
    rogue.write_all(&[2, 0, 0, 0, 0xde, 0xad]).await.unwrap();

    let mut rogue = Framed::new(rogue, ClientCodec::default());
    let end = timeout(WAIT, rogue.next()).await.unwrap();
    assert!(end.is_none() || end.unwrap().is_err());

    assert_nothing_pending(&mut b, "B").await;

    shutdown.shutdown();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_terminates_clients() {
    let (addr, shutdown, server) = start_server().await;
    let mut a = join(&addr, "A").await;

    shutdown.shutdown();

    assert_eq!(recv(&mut a).await.kind, ResponseKind::Terminate);
    assert!(timeout(WAIT, a.next()).await.unwrap().is_none());
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_completes_with_peer_that_never_reads() {
    let (addr, shutdown, server) = start_server().await;
    let _silent = join(&addr, "V").await;
    let mut a = join(&addr, "A").await;

    // Far more than the silent peer's socket buffers hold.
    let bulk = "x".repeat(60_000);
    for _ in 0..200 {
        send(&mut a, "A", &bulk).await;
    }
    for _ in 0..200 {
        assert_eq!(recv(&mut a).await.content.len(), bulk.len());
    }

    shutdown.shutdown();

    timeout(WAIT, server)
        .await
        .expect("shutdown blocked on a peer that never reads")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn long_username_is_refused_without_affecting_others() {
    let (addr, shutdown, server) = start_server().await;
    let mut b = join(&addr, "B").await;

    let stream = TcpStream::connect(&addr).await.unwrap();
    let mut rogue = Framed::new(stream, ClientCodec::default());
    rogue
        .send(Request::register("x".repeat(40_000)))
        .await
        .unwrap();

    assert_eq!(
        recv(&mut rogue).await,
        Response::server_private("xxxxxxxx...", "Username must be 8 characters or less")
    );
    assert_nothing_pending(&mut b, "B").await;

    shutdown.shutdown();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn whisper_to_long_unknown_name_keeps_sender_connected() {
    let (addr, shutdown, server) = start_server().await;
    let mut a = join(&addr, "A").await;

    send(&mut a, "A", &format!("/w {} hi", "z".repeat(40_000))).await;

    assert_eq!(
        recv(&mut a).await,
        Response::server_private("A", "User zzzzzzzz... does not exist")
    );
    assert_nothing_pending(&mut a, "A").await;

    shutdown.shutdown();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn broadcast_at_frame_limit_reaches_everyone() {
    use chatroom::codec::DEFAULT_MAX_FRAME_LENGTH;

    let (addr, shutdown, server) = start_server().await;
    let (mut a, mut b, mut c) = room(&addr).await;

    // Request payload: three u32 enums, three length prefixes, sender "A".
    let content = "m".repeat(DEFAULT_MAX_FRAME_LENGTH - 25);
    send(&mut a, "A", &content).await;

    for (client, name) in [(&mut a, "A"), (&mut b, "B"), (&mut c, "C")] {
        let res = recv(client).await;
        assert_eq!(res.kind, ResponseKind::Broadcast);
        assert_eq!(res.content.len(), content.len());
        assert_nothing_pending(client, name).await;
    }

    shutdown.shutdown();
    server.await.unwrap().unwrap();
}
