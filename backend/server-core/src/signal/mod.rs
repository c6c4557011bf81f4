//! Lifecycle signals relayed from a running server to its owner.
//!
//! Each [`ServerHandle`](crate::ServerHandle) holds one [`SignalSink`]; the owner
//! keeps the matching [`SignalReceiver`]. Several handles may share a receiver by
//! cloning the sink, which is why every event carries the id of the server that
//! produced it.

mod sink;

pub use sink::{SignalReceiver, SignalSink, signal_channel};

use std::fmt::{Display, Formatter, Result as FormatResult};

use serde::Serialize;

const LAUNCHED: &str = "LAUNCHED";
const TERMINATED: &str = "TERMINATED";
const CRASHED: &str = "CRASHED";

/// State change of a managed server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "signal", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerSignal {
    /// The server finished initializing and accepts connections.
    Launched,

    /// The server stopped after a graceful shutdown.
    Terminated,

    /// The server was rejected, exited with a failure status, or faulted.
    Crashed { message: String },
}

impl ServerSignal {
    pub fn crashed(message: impl Into<String>) -> Self {
        ServerSignal::Crashed {
            message: message.into(),
        }
    }

    /// Wire name of the signal.
    pub fn name(&self) -> &'static str {
        match self {
            ServerSignal::Launched => LAUNCHED,
            ServerSignal::Terminated => TERMINATED,
            ServerSignal::Crashed { .. } => CRASHED,
        }
    }

    /// Human-readable detail, present only for crashes.
    pub fn message(&self) -> Option<&str> {
        match self {
            ServerSignal::Crashed { message } => Some(message),
            _ => None,
        }
    }

    /// Terminal signals end a handle's life; at most one is ever sent per handle.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ServerSignal::Launched)
    }
}

impl Display for ServerSignal {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        match self.message() {
            Some(message) => write!(formatter, "{}: {message}", self.name()),
            None => write!(formatter, "{}", self.name()),
        }
    }
}

/// A [`ServerSignal`] tagged with the id of the server that emitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerEvent {
    pub server_id: u64,
    #[serde(flatten)]
    pub signal: ServerSignal,
}

impl ServerEvent {
    pub fn new(server_id: u64, signal: ServerSignal) -> Self {
        Self { server_id, signal }
    }

    pub fn is_terminal(&self) -> bool {
        self.signal.is_terminal()
    }
}
