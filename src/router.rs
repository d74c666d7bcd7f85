//! Response routing
//!
//! Decides which registry entries receive a response, based on its kind,
//! and enqueues it on each target's outbound queue.

use tracing::debug;

use crate::connection::Connection;
use crate::message::Response;
use crate::registry::{quoted_name, Registry};
use crate::types::ResponseKind;

/// Deliver `res` to its recipients
///
/// - `ServerPrivate`: the user named `receiver`, if present.
/// - `Whisper`: sender and receiver. An unknown receiver turns the
///   response into a `ServerPrivate` error addressed to the sender alone.
/// - `Broadcast`, `ServerAll`, `Terminate`: every live connection.
///
/// Returns the number of queues the response was placed on.
pub fn route(registry: &Registry, mut res: Response) -> usize {
    match res.kind {
        ResponseKind::ServerPrivate => match registry.by_username(&res.receiver) {
            Some(conn) => deliver(conn, res),
            None => 0,
        },
        ResponseKind::Whisper => {
            let sender = registry.by_username(&res.sender);
            let Some(receiver) = registry.by_username(&res.receiver) else {
                res.kind = ResponseKind::ServerPrivate;
                res.content = format!("User {} does not exist", quoted_name(&res.receiver));
                res.receiver = std::mem::take(&mut res.sender);
                return sender.map_or(0, |conn| deliver(conn, res));
            };

            match sender {
                Some(sender) if sender.addr() != receiver.addr() => {
                    deliver(sender, res.clone()) + deliver(receiver, res)
                }
                _ => deliver(receiver, res),
            }
        }
        ResponseKind::Broadcast | ResponseKind::ServerAll | ResponseKind::Terminate => registry
            .iter()
            .map(|conn| deliver(conn, res.clone()))
            .sum(),
    }
}

fn deliver(conn: &Connection, res: Response) -> usize {
    match conn.send(res) {
        Ok(()) => 1,
        Err(e) => {
            // Writer already gone; its removal is on the way.
            debug!("Dropping response for {}: {}", conn.display_name(), e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    type Inbox = mpsc::UnboundedReceiver<Response>;

    fn user(registry: &mut Registry, name: &str) -> Inbox {
        let (tx, rx) = mpsc::unbounded_channel();
        let addr = format!("{name}-addr");
        registry
            .add(Connection::new(addr.clone(), tx, CancellationToken::new()))
            .unwrap();
        registry.register(&addr, name).unwrap();
        rx
    }

    fn drain(inbox: &mut Inbox) -> Vec<Response> {
        let mut out = Vec::new();
        while let Ok(res) = inbox.try_recv() {
            out.push(res);
        }
        out
    }

    fn whisper(from: &str, to: &str, content: &str) -> Response {
        Response {
            kind: ResponseKind::Whisper,
            sender: from.into(),
            receiver: to.into(),
            content: content.into(),
        }
    }

    #[test]
    fn test_broadcast_reaches_everyone_once() {
        let mut registry = Registry::new();
        let mut inboxes = vec![
            user(&mut registry, "a"),
            user(&mut registry, "b"),
            user(&mut registry, "c"),
        ];

        let res = Response {
            kind: ResponseKind::Broadcast,
            sender: "a".into(),
            content: "hi".into(),
            ..Default::default()
        };
        assert_eq!(route(&registry, res.clone()), 3);

        for inbox in &mut inboxes {
            assert_eq!(drain(inbox), vec![res.clone()]);
        }
    }

    #[test]
    fn test_server_all_includes_unregistered() {
        let mut registry = Registry::new();
        let mut a = user(&mut registry, "a");
        let (tx, mut anon) = mpsc::unbounded_channel();
        registry
            .add(Connection::new("anon", tx, CancellationToken::new()))
            .unwrap();

        assert_eq!(route(&registry, Response::server_all("x")), 2);
        assert_eq!(drain(&mut a).len(), 1);
        assert_eq!(drain(&mut anon).len(), 1);
    }

    #[test]
    fn test_server_private_single_target() {
        let mut registry = Registry::new();
        let mut a = user(&mut registry, "a");
        let mut b = user(&mut registry, "b");

        assert_eq!(route(&registry, Response::server_private("a", "Pong!")), 1);
        assert_eq!(drain(&mut a)[0].content, "Pong!");
        assert!(drain(&mut b).is_empty());

        assert_eq!(route(&registry, Response::server_private("zed", "x")), 0);
    }

    #[test]
    fn test_whisper_reaches_both_parties_only() {
        let mut registry = Registry::new();
        let mut a = user(&mut registry, "a");
        let mut b = user(&mut registry, "b");
        let mut c = user(&mut registry, "c");

        let res = whisper("a", "b", "hello");
        assert_eq!(route(&registry, res.clone()), 2);

        assert_eq!(drain(&mut a), vec![res.clone()]);
        assert_eq!(drain(&mut b), vec![res]);
        assert!(drain(&mut c).is_empty());
    }

    #[test]
    fn test_whisper_unknown_receiver() {
        let mut registry = Registry::new();
        let mut a = user(&mut registry, "a");
        let mut b = user(&mut registry, "b");

        assert_eq!(route(&registry, whisper("a", "z", "hi")), 1);

        let got = drain(&mut a);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].kind, ResponseKind::ServerPrivate);
        assert_eq!(got[0].content, "User z does not exist");
        assert_eq!(got[0].receiver, "a");
        assert!(drain(&mut b).is_empty());
    }

    #[test]
    fn test_whisper_unknown_long_receiver_is_quoted_short() {
        let mut registry = Registry::new();
        let mut a = user(&mut registry, "a");

        let long = "z".repeat(40_000);
        assert_eq!(route(&registry, whisper("a", &long, "hi")), 1);

        let got = drain(&mut a);
        assert_eq!(got[0], Response::server_private("a", "User zzzzzzzz... does not exist"));
    }

    #[test]
    fn test_whisper_to_self_delivered_once() {
        let mut registry = Registry::new();
        let mut a = user(&mut registry, "a");

        assert_eq!(route(&registry, whisper("a", "a", "note")), 1);
        assert_eq!(drain(&mut a).len(), 1);
    }

    #[test]
    fn test_stopped_writer_is_skipped() {
        let mut registry = Registry::new();
        let a = user(&mut registry, "a");
        let mut b = user(&mut registry, "b");
        drop(a);

        assert_eq!(route(&registry, Response::server_all("x")), 1);
        assert_eq!(drain(&mut b).len(), 1);
    }
}
