//! Process-wide "active server" marker.
//!
//! At most one server may run at a time. The marker is an explicit object so
//! that tests can run isolated registries in parallel; production code that
//! needs the C-ABI launched callback uses [`InstanceRegistry::global`].
//!
//! # Ordering
//!
//! [`InstanceRegistry::notify_launched`] sends `Launched` while holding the same
//! lock that [`InstanceRegistry::release`] takes. A handle always releases before
//! emitting its terminal signal, so `Launched` can never trail a terminal signal.

mod notifier;

pub use notifier::LaunchedNotifier;

use crate::error::registry::RegistryError;
use crate::signal::{ServerSignal, SignalSink};

use common::ErrorLocation;

use std::panic::Location;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use log::{debug, error, trace, warn};

static GLOBAL_REGISTRY: OnceLock<Arc<InstanceRegistry>> = OnceLock::new();

#[derive(Debug)]
struct ActiveServer {
    server_id: u64,
    sink: SignalSink,
    launched: bool,
}

/// Single-slot registry enforcing one running server.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    active: Mutex<Option<ActiveServer>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry shared by the whole process.
    pub fn global() -> Arc<InstanceRegistry> {
        Arc::clone(GLOBAL_REGISTRY.get_or_init(|| Arc::new(InstanceRegistry::new())))
    }

    // A panic while holding the lock cannot leave the slot half-written, so the
    // poisoned value is still consistent.
    fn slot(&self) -> MutexGuard<'_, Option<ActiveServer>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically claim the marker for `server_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyActive`] if any server, including
    /// `server_id` itself, already holds the marker.
    #[track_caller]
    pub fn try_acquire(&self, server_id: u64, sink: SignalSink) -> Result<(), RegistryError> {
        let mut slot = self.slot();

        if let Some(ref existing) = *slot {
            debug!(
                "Server {server_id} rejected, server {} is active",
                existing.server_id
            );
            return Err(RegistryError::AlreadyActive {
                active_id: existing.server_id,
                location: ErrorLocation::from(Location::caller()),
            });
        }

        *slot = Some(ActiveServer {
            server_id,
            sink,
            launched: false,
        });
        trace!("Server {server_id} acquired the registry");
        Ok(())
    }

    /// Clear the marker if `server_id` holds it.
    ///
    /// Returns `true` if the marker was cleared.
    pub fn release(&self, server_id: u64) -> bool {
        let mut slot = self.slot();

        match *slot {
            Some(ref existing) if existing.server_id == server_id => {
                *slot = None;
                trace!("Server {server_id} released the registry");
                true
            }
            Some(ref existing) => {
                warn!(
                    "Server {server_id} tried to release registry held by server {}",
                    existing.server_id
                );
                false
            }
            None => false,
        }
    }

    /// Id of the server currently holding the marker.
    pub fn active_id(&self) -> Option<u64> {
        self.slot().as_ref().map(|a| a.server_id)
    }

    pub fn is_active(&self, server_id: u64) -> bool {
        self.active_id() == Some(server_id)
    }

    /// Dispatch `Launched` to the active server.
    ///
    /// Repeated calls for the same active server are ignored so the owner sees
    /// `Launched` at most once.
    ///
    /// # Returns
    ///
    /// * `Ok(server_id)` - The server the callback was dispatched to
    /// * `Err(RegistryError::NoActiveServer)` - The native layer called back outside
    ///   a run window
    #[track_caller]
    pub fn notify_launched(&self) -> Result<u64, RegistryError> {
        let mut slot = self.slot();

        let Some(active) = slot.as_mut() else {
            error!("Launched callback fired while no server is active");
            return Err(RegistryError::NoActiveServer {
                message: String::from("Launched callback fired while no server is active"),
                location: ErrorLocation::from(Location::caller()),
            });
        };

        if active.launched {
            debug!(
                "Ignoring repeated launched callback for server {}",
                active.server_id
            );
            return Ok(active.server_id);
        }

        active.launched = true;
        active.sink.emit(active.server_id, ServerSignal::Launched);
        Ok(active.server_id)
    }
}
