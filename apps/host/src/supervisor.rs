//! Keeps one lighttpd server running and reports its lifecycle on stdout.
//!
//! Each run uses a fresh single-use [`ServerHandle`] with a new id. Every
//! [`ServerEvent`] is written as one JSON line. A crash is followed by an
//! exponential-backoff restart while restarts remain; a shutdown request stops
//! the current server gracefully and disables further restarts.

use crate::error::HostError;

use server_core::config::HostConfig;
use server_core::{
    InstanceRegistry, LaunchRequest, NativeServer, ServerEvent, ServerHandle, ServerSignal,
    SignalSink, signal_channel,
};

use common::ErrorLocation;

use std::future::Future;
use std::io::Write;
use std::panic::Location;
use std::pin::pin;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use backoff::{ExponentialBackoff, backoff::Backoff};
use humantime::format_duration;
use log::{debug, info, warn};
use tokio::select;
use tokio::task::spawn_blocking;
use tokio::time::sleep as TokioSleep;

pub const DEFAULT_RESTART_INITIAL_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorOptions {
    pub max_restarts: u32,
    pub restart_initial_delay: Duration,
    pub restart_max_delay: Duration,
    pub pretty: bool,
}

impl SupervisorOptions {
    pub fn from_config(config: &HostConfig, pretty: bool) -> Self {
        let restart_max_delay = Duration::from_secs(config.supervisor.restart_backoff_max_secs);
        Self {
            max_restarts: config.supervisor.max_restarts,
            restart_initial_delay: DEFAULT_RESTART_INITIAL_DELAY.min(restart_max_delay),
            restart_max_delay,
            pretty,
        }
    }
}

/// How supervision ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorOutcome {
    /// The last server stopped gracefully.
    Terminated,
    /// The last server crashed and no restart followed.
    Crashed { message: String },
}

impl SupervisorOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SupervisorOutcome::Terminated)
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

pub struct Supervisor<W> {
    native: Arc<dyn NativeServer>,
    registry: Arc<InstanceRegistry>,
    request: LaunchRequest,
    options: SupervisorOptions,
    out: W,
    next_id: u64,
    restarts: u32,
}

impl<W: Write> Supervisor<W> {
    /// Supervisor on the process-wide registry, writing events to `out`.
    pub fn new(
        native: Arc<dyn NativeServer>,
        request: LaunchRequest,
        options: SupervisorOptions,
        out: W,
    ) -> Self {
        Self {
            native,
            registry: InstanceRegistry::global(),
            request,
            options,
            out,
            next_id: 1,
            restarts: 0,
        }
    }

    pub fn with_registry(mut self, registry: Arc<InstanceRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Restarts performed so far.
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// Run servers until one terminates, or crashes with no restart left.
    ///
    /// `shutdown` resolving asks the current server to stop gracefully.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] if a handle cannot be built or started, or an
    /// event line cannot be written.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<SupervisorOutcome, HostError>
    where
        F: Future<Output = ()>,
    {
        let (sink, mut rx) = signal_channel();
        let mut backoff = self.restart_backoff();
        let mut shutdown = pin!(shutdown);
        let mut stopping = false;
        let mut handle = self.start_handle(&sink)?;

        loop {
            let event = select! {
                () = &mut shutdown, if !stopping => {
                    info!("Shutdown requested, stopping server {}", handle.id());
                    stopping = true;
                    handle.request_graceful_stop();
                    continue;
                }
                event = rx.recv() => event,
            };

            let Some(event) = event else {
                return Err(HostError::Host {
                    message: String::from("Signal channel closed while a server was running"),
                    location: ErrorLocation::from(Location::caller()),
                });
            };

            self.write_event(&event)?;

            if !event.is_terminal() {
                continue;
            }

            // The server thread exits right after its terminal signal.
            let state = spawn_blocking(move || handle.join())
                .await
                .map_err(|e| HostError::Host {
                    message: format!("Join task for server {} failed: {e}", event.server_id),
                    location: ErrorLocation::from(Location::caller()),
                })??;
            debug!("Server {} finished in state {state:?}", event.server_id);

            let ServerSignal::Crashed { message } = event.signal else {
                return Ok(SupervisorOutcome::Terminated);
            };

            if stopping {
                return Ok(SupervisorOutcome::Crashed { message });
            }

            if self.restarts >= self.options.max_restarts {
                warn!(
                    "Server {} crashed, no restarts left ({} used)",
                    event.server_id, self.restarts
                );
                return Ok(SupervisorOutcome::Crashed { message });
            }

            let delay = backoff
                .next_backoff()
                .unwrap_or(self.options.restart_max_delay);
            self.restarts += 1;
            warn!(
                "Server {} crashed, restart {}/{} in {}",
                event.server_id,
                self.restarts,
                self.options.max_restarts,
                format_duration(delay)
            );

            select! {
                () = TokioSleep(delay) => {}
                () = &mut shutdown => {
                    info!("Shutdown requested during restart delay, not restarting");
                    return Ok(SupervisorOutcome::Crashed { message });
                }
            }

            handle = self.start_handle(&sink)?;
        }
    }

    fn restart_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.options.restart_initial_delay,
            current_interval: self.options.restart_initial_delay,
            max_interval: self.options.restart_max_delay,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    #[track_caller]
    fn start_handle(&mut self, sink: &SignalSink) -> Result<ServerHandle, HostError> {
        let id = self.next_id;
        self.next_id += 1;

        let mut handle = ServerHandle::builder()
            .with_id(id)
            .with_config_path(self.request.config_path())
            .with_errlog_path(self.request.errlog_path())
            .with_signal_sink(sink.clone())
            .with_native(Arc::clone(&self.native))
            .with_registry(Arc::clone(&self.registry))
            .build()?;

        handle.start()?;
        info!(
            "Started server {id} with config {}",
            self.request.config_path().display()
        );
        Ok(handle)
    }

    #[track_caller]
    fn write_event(&mut self, event: &ServerEvent) -> Result<(), HostError> {
        let json = if self.options.pretty {
            serde_json::to_string_pretty(event)
        } else {
            serde_json::to_string(event)
        }
        .map_err(|e| HostError::Output {
            message: format!("Failed to serialize event: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        writeln!(self.out, "{json}")
            .and_then(|()| self.out.flush())
            .map_err(|e| HostError::Output {
                message: format!("Failed to write event: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })
    }
}
