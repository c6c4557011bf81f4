//! Managed server handle.
//!
//! A [`ServerHandle`] owns exactly one attempt to run a [`NativeServer`] on a
//! dedicated thread. It is single-use: once started it can never be started
//! again, and a fresh handle must be built for each run.
//!
//! ```text
//! Created -> Starting -> Running -> Terminated | Crashed
//!                     \-> Rejected   (another server holds the registry)
//! ```
//!
//! Every run ends with exactly one terminal signal, and the registry is always
//! released before that signal is sent, so an owner may start a new handle as
//! soon as it sees `Terminated` or `Crashed`.

mod builder;

pub use builder::ServerHandleBuilder;

use crate::error::handle::HandleError;
use crate::native::{LaunchRequest, NativeServer, ShutdownToken};
use crate::registry::{InstanceRegistry, LaunchedNotifier};
use crate::signal::{ServerSignal, SignalSink};
use crate::{ANOTHER_INSTANCE_ACTIVE_MESSAGE, NATIVE_SUCCESS_STATUS};

use common::ErrorLocation;

use std::any::Any;
use std::fmt::{Debug, Formatter, Result as FormatResult};
use std::panic::{AssertUnwindSafe, Location, catch_unwind};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{Builder as ThreadBuilder, JoinHandle};

use log::{debug, error, info};
use serde::Serialize;

const THREAD_NAME_PREFIX: &str = "lighttpd-server-";
const PANIC_FALLBACK_MESSAGE: &str = "Native server panicked";

/// Lifecycle position of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandleState {
    Created,
    Starting,
    Running,
    Terminated,
    Crashed,
    Rejected,
}

impl HandleState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            HandleState::Terminated | HandleState::Crashed | HandleState::Rejected
        )
    }

    /// The handle's thread is alive.
    pub fn is_active(self) -> bool {
        matches!(self, HandleState::Starting | HandleState::Running)
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<HandleState>,
    shutdown: ShutdownToken,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, HandleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One launch attempt of the native server.
pub struct ServerHandle {
    id: u64,
    request: LaunchRequest,
    sink: SignalSink,
    native: Arc<dyn NativeServer>,
    registry: Arc<InstanceRegistry>,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl Debug for ServerHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        f.debug_struct("ServerHandle")
            .field("id", &self.id)
            .field("request", &self.request)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ServerHandle {
    pub fn builder() -> ServerHandleBuilder {
        ServerHandleBuilder::default()
    }

    pub(crate) fn new(
        id: u64,
        request: LaunchRequest,
        sink: SignalSink,
        native: Arc<dyn NativeServer>,
        registry: Arc<InstanceRegistry>,
    ) -> Self {
        Self {
            id,
            request,
            sink,
            native,
            registry,
            shared: Arc::new(Shared {
                state: Mutex::new(HandleState::Created),
                shutdown: ShutdownToken::new(),
            }),
            thread: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn config_path(&self) -> &Path {
        self.request.config_path()
    }

    pub fn errlog_path(&self) -> &Path {
        self.request.errlog_path()
    }

    pub fn state(&self) -> HandleState {
        *self.shared.lock_state()
    }

    /// Whether the handle's thread is still running.
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Run the server on a dedicated thread.
    ///
    /// Returns as soon as the thread is spawned; the outcome arrives later as
    /// signals on the sink.
    ///
    /// # Errors
    ///
    /// * [`HandleError::AlreadyStarted`] - The handle was started before
    /// * [`HandleError::ThreadSpawn`] - The OS refused to create the thread
    #[track_caller]
    pub fn start(&mut self) -> Result<(), HandleError> {
        let runner = self.begin()?;

        let thread = ThreadBuilder::new()
            .name(format!("{THREAD_NAME_PREFIX}{}", self.id))
            .spawn(move || runner.run())
            .map_err(|e| {
                *self.shared.lock_state() = HandleState::Created;
                HandleError::ThreadSpawn {
                    message: format!("Failed to spawn thread for server {}: {e}", self.id),
                    location: ErrorLocation::from(Location::caller()),
                    source: e,
                }
            })?;

        debug!("Server {} thread started", self.id);
        self.thread = Some(thread);
        Ok(())
    }

    /// Move `Created -> Starting` and hand out the work for the server thread.
    #[track_caller]
    pub(crate) fn begin(&self) -> Result<Runner, HandleError> {
        let mut state = self.shared.lock_state();
        if *state != HandleState::Created {
            return Err(HandleError::AlreadyStarted {
                server_id: self.id,
                location: ErrorLocation::from(Location::caller()),
            });
        }
        *state = HandleState::Starting;

        Ok(Runner {
            id: self.id,
            request: self.request.clone(),
            sink: self.sink.clone(),
            native: Arc::clone(&self.native),
            registry: Arc::clone(&self.registry),
            shared: Arc::clone(&self.shared),
        })
    }

    /// Ask the server to stop gracefully.
    ///
    /// Does not wait; the stop is observed later as the terminal signal. A
    /// handle that was never started, or has already finished, is left alone.
    ///
    /// Returns `true` if a stop was requested.
    pub fn request_graceful_stop(&self) -> bool {
        let state = self.shared.lock_state();

        match *state {
            HandleState::Created => {
                debug!("Server {} not started, ignoring stop request", self.id);
                false
            }
            HandleState::Starting => {
                info!("Server {} stop requested before launch", self.id);
                self.shared.shutdown.request();
                true
            }
            HandleState::Running => {
                info!("Server {} graceful stop requested", self.id);
                self.shared.shutdown.request();
                self.native.request_shutdown();
                true
            }
            finished => {
                debug!(
                    "Server {} already finished ({finished:?}), ignoring stop request",
                    self.id
                );
                false
            }
        }
    }

    /// Wait for the handle's thread to finish and return the final state.
    ///
    /// # Errors
    ///
    /// * [`HandleError::NotStarted`] - `start` was never called
    /// * [`HandleError::ThreadJoin`] - The thread itself panicked
    #[track_caller]
    pub fn join(&mut self) -> Result<HandleState, HandleError> {
        let Some(thread) = self.thread.take() else {
            let state = self.state();
            if state == HandleState::Created {
                return Err(HandleError::NotStarted {
                    server_id: self.id,
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            return Ok(state);
        };

        thread.join().map_err(|panic| HandleError::ThreadJoin {
            message: format!(
                "Server {} thread panicked: {}",
                self.id,
                panic_message(panic.as_ref())
            ),
            location: ErrorLocation::from(Location::caller()),
        })?;

        Ok(self.state())
    }
}

/// Everything the server thread needs, moved into it on start.
pub(crate) struct Runner {
    id: u64,
    request: LaunchRequest,
    sink: SignalSink,
    native: Arc<dyn NativeServer>,
    registry: Arc<InstanceRegistry>,
    shared: Arc<Shared>,
}

impl Runner {
    pub(crate) fn run(self) {
        info!("Server {} run triggered", self.id);

        if let Err(e) = self.registry.try_acquire(self.id, self.sink.clone()) {
            error!("{ANOTHER_INSTANCE_ACTIVE_MESSAGE}: {e}");
            self.finish(
                HandleState::Rejected,
                ServerSignal::crashed(ANOTHER_INSTANCE_ACTIVE_MESSAGE),
                false,
            );
            return;
        }

        let cancelled = {
            let mut state = self.shared.lock_state();
            let cancelled = self.shared.shutdown.is_requested();
            if !cancelled {
                *state = HandleState::Running;
            }
            cancelled
        };

        if cancelled {
            info!("Server {} cancelled before launch", self.id);
            self.finish(HandleState::Terminated, ServerSignal::Terminated, true);
            return;
        }

        let launched = LaunchedNotifier::new(Arc::clone(&self.registry));
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.native
                .launch(&self.request, launched, &self.shared.shutdown)
        }));

        let (state, signal) = match outcome {
            Ok(Ok(NATIVE_SUCCESS_STATUS)) => {
                info!("Server {} terminated gracefully", self.id);
                (HandleState::Terminated, ServerSignal::Terminated)
            }
            Ok(Ok(status)) => {
                error!("Server {} crashed with status {status}", self.id);
                (
                    HandleState::Crashed,
                    ServerSignal::crashed(format!("Native server exited with status {status}")),
                )
            }
            Ok(Err(e)) => {
                error!("Server {} crashed: {e}", self.id);
                (HandleState::Crashed, ServerSignal::crashed(e.to_string()))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Server {} panicked: {message}", self.id);
                (HandleState::Crashed, ServerSignal::crashed(message))
            }
        };

        self.finish(state, signal, true);
    }

    /// Settle the state, then release the registry, then emit.
    ///
    /// Once the state has left `Running`, `request_graceful_stop` no longer
    /// reaches the native server, which may be shared with the next handle.
    fn finish(&self, state: HandleState, signal: ServerSignal, release: bool) {
        *self.shared.lock_state() = state;
        if release {
            self.registry.release(self.id);
        }
        self.sink.emit(self.id, signal);
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from(PANIC_FALLBACK_MESSAGE)
    }
}
