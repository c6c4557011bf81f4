//! Shared fixtures for host integration tests.

use server_core::error::native::NativeError;
use server_core::{LaunchRequest, LaunchedNotifier, NativeServer, ShutdownToken};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Mutex, PoisonError};

/// How one scripted launch ends.
#[derive(Debug, Clone, Copy)]
pub enum Run {
    /// Report launched, then return this status.
    Exit(i32),
    /// Report launched, then block until a shutdown request.
    UntilShutdown,
}

/// [`NativeServer`] that plays one [`Run`] per launch, in order.
///
/// Launches beyond the script behave like [`Run::UntilShutdown`].
pub struct ScriptedServer {
    runs: Mutex<VecDeque<Run>>,
    stop_tx: Sender<()>,
    stop_rx: Mutex<Receiver<()>>,
    launches: AtomicUsize,
    shutdown_requests: AtomicUsize,
}

impl ScriptedServer {
    pub fn new(runs: impl IntoIterator<Item = Run>) -> Self {
        let (stop_tx, stop_rx) = channel();
        Self {
            runs: Mutex::new(runs.into_iter().collect()),
            stop_tx,
            stop_rx: Mutex::new(stop_rx),
            launches: AtomicUsize::new(0),
            shutdown_requests: AtomicUsize::new(0),
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn shutdown_requests(&self) -> usize {
        self.shutdown_requests.load(Ordering::SeqCst)
    }
}

impl NativeServer for ScriptedServer {
    fn launch(
        &self,
        _request: &LaunchRequest,
        launched: LaunchedNotifier,
        shutdown: &ShutdownToken,
    ) -> Result<i32, NativeError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let run = self
            .runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(Run::UntilShutdown);

        launched.notify().unwrap();

        match run {
            Run::Exit(status) => Ok(status),
            Run::UntilShutdown if shutdown.is_requested() => Ok(0),
            Run::UntilShutdown => {
                let _ = self
                    .stop_rx
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .recv();
                Ok(0)
            }
        }
    }

    fn request_shutdown(&self) {
        self.shutdown_requests.fetch_add(1, Ordering::SeqCst);
        let _ = self.stop_tx.send(());
    }
}

/// Parse newline-delimited JSON output into (server_id, signal) pairs.
pub fn event_lines(output: &[u8]) -> Vec<(u64, String)> {
    String::from_utf8_lossy(output)
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            (
                value["server_id"].as_u64().unwrap(),
                value["signal"].as_str().unwrap().to_string(),
            )
        })
        .collect()
}
