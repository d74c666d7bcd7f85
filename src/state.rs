//! Server lifecycle state machine
//!
//! `transition` is the pure `(state, event) -> state'` function. The
//! `Monitor` applies events reported through `StatusHandle`s, publishes
//! the current state on a watch channel and returns once a terminal
//! state is reached.

use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::error::TransitionError;

/// Coarse server lifecycle
///
/// `Idle → Listening → {Closing | Error | Unknown}`; the last three are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServerState {
    #[default]
    Idle,
    Listening,
    Closing,
    Error,
    Unknown,
}

impl ServerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closing | Self::Error | Self::Unknown)
    }
}

/// Signals that drive the lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Socket bound and acceptor running
    Listen,
    /// Deliberate shutdown request
    Shutdown,
    /// Unrecoverable fault (bind, accept, registry)
    Fault(String),
    /// A status code nobody understands; fatal
    Unrecognized(u32),
}

/// Compute the next state, or reject an illegal event
pub fn transition(state: ServerState, event: ServerEvent) -> Result<ServerState, TransitionError> {
    use ServerEvent as E;
    use ServerState as S;

    let next = match (state, &event) {
        (S::Idle, E::Listen) => Some(S::Listening),
        (S::Idle | S::Listening, E::Shutdown) => Some(S::Closing),
        (S::Idle | S::Listening, E::Fault(_)) => Some(S::Error),
        (S::Idle | S::Listening, E::Unrecognized(_)) => Some(S::Unknown),
        _ => None,
    };
    next.ok_or(TransitionError { state, event })
}

/// Cloneable handle for reporting lifecycle events
#[derive(Debug, Clone)]
pub struct StatusHandle {
    events: mpsc::UnboundedSender<ServerEvent>,
}

impl StatusHandle {
    /// Report an event; ignored once the monitor has finished
    pub fn report(&self, event: ServerEvent) {
        let _ = self.events.send(event);
    }

    pub fn shutdown(&self) {
        self.report(ServerEvent::Shutdown);
    }

    pub fn fault(&self, reason: impl Into<String>) {
        self.report(ServerEvent::Fault(reason.into()));
    }
}

/// Owner of the current `ServerState`
#[derive(Debug)]
pub struct Monitor {
    state: ServerState,
    fault: Option<String>,
    events: mpsc::UnboundedReceiver<ServerEvent>,
    published: watch::Sender<ServerState>,
}

/// Create a monitor in the `Idle` state and a handle feeding it
pub fn channel() -> (StatusHandle, Monitor) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (published, _) = watch::channel(ServerState::Idle);
    info!("Server created, idling");
    (
        StatusHandle { events: tx },
        Monitor {
            state: ServerState::Idle,
            fault: None,
            events: rx,
            published,
        },
    )
}

impl Monitor {
    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Reason recorded by the `Fault` event that ended the server
    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    /// Observe state changes
    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.published.subscribe()
    }

    /// Apply one event immediately
    pub fn apply(&mut self, event: ServerEvent) -> Result<ServerState, TransitionError> {
        let reason = match &event {
            ServerEvent::Fault(reason) => Some(reason.clone()),
            _ => None,
        };
        let next = transition(self.state, event)?;

        match next {
            ServerState::Listening => info!("Server listening"),
            ServerState::Closing => info!("Server closing"),
            ServerState::Error => error!("Server fault: {}", reason.as_deref().unwrap_or("unknown")),
            ServerState::Unknown => error!("Unknown server status"),
            ServerState::Idle => {}
        }

        if reason.is_some() {
            self.fault = reason;
        }
        self.state = next;
        self.published.send_replace(next);
        Ok(next)
    }

    /// Apply reported events until a terminal state is reached
    ///
    /// Illegal events are logged and dropped. If every handle is gone
    /// before that, the server is considered to be in `Unknown`.
    pub async fn run(&mut self) -> ServerState {
        while !self.state.is_terminal() {
            let Some(event) = self.events.recv().await else {
                warn!("All status handles dropped");
                self.state = ServerState::Unknown;
                self.published.send_replace(self.state);
                break;
            };

            if let Err(e) = self.apply(event) {
                warn!("{}", e);
            }
        }
        self.state
    }
}
