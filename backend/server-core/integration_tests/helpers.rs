//! Shared fixtures for integration tests.

use server_core::error::native::NativeError;
use server_core::{
    LaunchRequest, LaunchedNotifier, NativeServer, ServerEvent, ShutdownToken, SignalReceiver,
};

use common::ErrorLocation;

use std::panic::Location;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// What the scripted server does next while inside `launch`.
#[derive(Debug)]
pub enum Step {
    /// Fire the launched callback.
    Launched,
    /// Return this status.
    Exit(i32),
    /// Return a native error with this message.
    Fail(String),
    /// Panic with this message.
    Panic(String),
}

/// In-memory [`NativeServer`] driven step by step from the test.
///
/// `launch` blocks until a step tells it to return; `request_shutdown` queues
/// `Exit(0)`, mirroring a graceful native stop.
pub struct ScriptedNative {
    steps_tx: Sender<Step>,
    steps_rx: Mutex<Receiver<Step>>,
    entered_tx: Sender<LaunchRequest>,
    entered_rx: Mutex<Receiver<LaunchRequest>>,
    launches: AtomicUsize,
    shutdown_requests: AtomicUsize,
}

impl ScriptedNative {
    pub fn new() -> Self {
        let (steps_tx, steps_rx) = channel();
        let (entered_tx, entered_rx) = channel();
        Self {
            steps_tx,
            steps_rx: Mutex::new(steps_rx),
            entered_tx,
            entered_rx: Mutex::new(entered_rx),
            launches: AtomicUsize::new(0),
            shutdown_requests: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, step: Step) {
        self.steps_tx.send(step).unwrap();
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn shutdown_requests(&self) -> usize {
        self.shutdown_requests.load(Ordering::SeqCst)
    }

    /// Block until `launch` has been entered, returning the request it got.
    pub fn wait_for_launch(&self) -> LaunchRequest {
        self.entered_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv_timeout(EVENT_TIMEOUT)
            .expect("native launch was not entered in time")
    }
}

impl NativeServer for ScriptedNative {
    fn launch(
        &self,
        request: &LaunchRequest,
        launched: LaunchedNotifier,
        shutdown: &ShutdownToken,
    ) -> Result<i32, NativeError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        self.entered_tx.send(request.clone()).unwrap();

        if shutdown.is_requested() {
            return Ok(0);
        }

        loop {
            let step = {
                let rx = self.steps_rx.lock().unwrap_or_else(PoisonError::into_inner);
                rx.recv()
            };

            match step {
                Ok(Step::Launched) => {
                    launched.notify().unwrap();
                }
                Ok(Step::Exit(status)) => return Ok(status),
                Ok(Step::Fail(message)) => {
                    return Err(NativeError::Fault {
                        message,
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
                Ok(Step::Panic(message)) => panic!("{message}"),
                Err(_) => return Ok(0),
            }
        }
    }

    fn request_shutdown(&self) {
        self.shutdown_requests.fetch_add(1, Ordering::SeqCst);
        let _ = self.steps_tx.send(Step::Exit(0));
    }
}

/// Next event on the channel, failing the test after [`EVENT_TIMEOUT`].
pub async fn next_event(rx: &mut SignalReceiver) -> ServerEvent {
    tokio::time::timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for a server event")
        .expect("signal channel closed")
}
