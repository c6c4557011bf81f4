use crate::signal::{ServerEvent, ServerSignal};

use log::{debug, info, warn};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Owner side of the signal channel.
pub type SignalReceiver = UnboundedReceiver<ServerEvent>;

/// Create a connected sink/receiver pair.
///
/// The channel is unbounded so that the server thread never blocks on a slow
/// owner; at most three events are ever produced per handle.
pub fn signal_channel() -> (SignalSink, SignalReceiver) {
    let (tx, rx) = unbounded_channel();
    (SignalSink { tx }, rx)
}

/// Sending half of the signal channel.
///
/// Usable from plain threads as well as async tasks.
#[derive(Debug, Clone)]
pub struct SignalSink {
    tx: UnboundedSender<ServerEvent>,
}

impl SignalSink {
    /// Deliver a signal for `server_id`.
    ///
    /// A dropped receiver is not an error for the server: the event is logged
    /// and discarded.
    pub fn emit(&self, server_id: u64, signal: ServerSignal) {
        match &signal {
            ServerSignal::Crashed { message } => {
                warn!("Server {server_id} signal {}: {message}", signal.name())
            }
            _ => info!("Server {server_id} signal {}", signal.name()),
        }

        if let Err(e) = self.tx.send(ServerEvent::new(server_id, signal)) {
            debug!(
                "Signal receiver dropped, discarding {} for server {server_id}",
                e.0.signal.name()
            );
        }
    }

    /// Whether the owner still listens.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
