//! Drives `ProcessServer` with small shell scripts standing in for lighttpd.

use crate::helpers::{EVENT_TIMEOUT, next_event};

use server_core::error::native::NativeError;
use server_core::native::process::ProcessServer;
use server_core::{
    HandleState, InstanceRegistry, LaunchRequest, LaunchedNotifier, NativeServer, ServerHandle,
    ServerSignal, ShutdownToken, signal_channel,
};

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serial_test::serial;
use tempfile::{TempDir, tempdir};

const PROBE_MAX_ELAPSED: Duration = Duration::from_millis(300);

/// Write an executable `/bin/sh` script standing in for the server binary.
fn fake_server(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("fake-lighttpd");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Delays every launch, leaving a window where the handle is `Running` but no
/// child exists yet.
struct SlowStart {
    inner: ProcessServer,
    delay: Duration,
}

impl NativeServer for SlowStart {
    fn launch(
        &self,
        request: &LaunchRequest,
        launched: LaunchedNotifier,
        shutdown: &ShutdownToken,
    ) -> Result<i32, NativeError> {
        std::thread::sleep(self.delay);
        self.inner.launch(request, launched, shutdown)
    }

    fn request_shutdown(&self) {
        self.inner.request_shutdown();
    }
}

fn build_handle<N: NativeServer + 'static>(
    id: u64,
    dir: &Path,
    server: &Arc<N>,
    registry: &Arc<InstanceRegistry>,
    sink: &server_core::SignalSink,
) -> ServerHandle {
    ServerHandle::builder()
        .with_id(id)
        .with_config_path(dir.join("lighttpd.conf"))
        .with_errlog_path(dir.join("error.log"))
        .with_signal_sink(sink.clone())
        .with_native(Arc::clone(server) as Arc<dyn NativeServer>)
        .with_registry(Arc::clone(registry))
        .build()
        .unwrap()
}

fn wait_for_child(server: &ProcessServer) -> u32 {
    let deadline = Instant::now() + EVENT_TIMEOUT;
    loop {
        if let Some(pid) = server.child_pid() {
            return pid;
        }
        assert!(Instant::now() < deadline, "child was never spawned");
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// **VALUE**: A failing server binary surfaces as CRASHED with its status, and its
/// stderr lands in the error log.
///
/// **BUG THIS CATCHES**: Would catch stderr being discarded or the exit code being
/// mapped to success.
#[tokio::test]
#[serial]
async fn given_server_exiting_3_when_run_through_handle_then_crashed_and_stderr_logged() {
    // GIVEN: A fake server that complains and exits 3
    let dir = tempdir().unwrap();
    let binary = fake_server(&dir, "echo 'can not bind socket' >&2\nexit 3");
    let server = Arc::new(
        ProcessServer::new(binary).with_launch_probe_max_elapsed(PROBE_MAX_ELAPSED),
    );
    let registry = Arc::new(InstanceRegistry::new());
    let (sink, mut rx) = signal_channel();
    let mut handle = build_handle(1, dir.path(), &server, &registry, &sink);

    // WHEN: Running it
    handle.start().unwrap();
    let event = next_event(&mut rx).await;

    // THEN: CRASHED mentioning 3, stderr in the error log
    assert_eq!(event.signal.name(), "CRASHED");
    assert!(event.signal.message().unwrap().contains('3'));
    assert_eq!(handle.join().unwrap(), HandleState::Crashed);
    assert_eq!(server.child_pid(), None);

    let errlog = fs::read_to_string(dir.path().join("error.log")).unwrap();
    assert!(errlog.contains("can not bind socket"), "{errlog}");
}

/// **VALUE**: Graceful stop interrupts the child and ends in TERMINATED.
///
/// **WHY THIS MATTERS**: This is the path a host takes on Ctrl-C; anything other
/// than TERMINATED would make it restart a server the user asked to stop.
#[tokio::test]
#[serial]
async fn given_running_server_when_graceful_stop_requested_then_terminated() {
    // GIVEN: A fake server that exits 0 on SIGINT
    let dir = tempdir().unwrap();
    let binary = fake_server(&dir, "trap 'exit 0' INT\nwhile true; do sleep 0.1; done");
    let server = Arc::new(
        ProcessServer::new(binary).with_launch_probe_max_elapsed(PROBE_MAX_ELAPSED),
    );
    let registry = Arc::new(InstanceRegistry::new());
    let (sink, mut rx) = signal_channel();
    let mut handle = build_handle(2, dir.path(), &server, &registry, &sink);
    handle.start().unwrap();
    wait_for_child(&server);

    // WHEN: Stopping
    assert!(handle.request_graceful_stop());
    let event = next_event(&mut rx).await;

    // THEN: TERMINATED, child reaped, registry free
    assert_eq!(event.signal, ServerSignal::Terminated);
    assert_eq!(handle.join().unwrap(), HandleState::Terminated);
    assert_eq!(server.child_pid(), None);
    assert_eq!(registry.active_id(), None);
}

/// **VALUE**: A stop issued after the handle is `Running` but before the child is
/// spawned still stops the server.
///
/// **WHY THIS MATTERS**: lighttpd never exits on its own; a lost stop leaves the
/// host hanging after Ctrl-C.
///
/// **BUG THIS CATCHES**: Would catch the launch discarding a stop that found no
/// child to interrupt.
#[tokio::test]
#[serial]
async fn given_stop_before_child_spawned_when_launch_proceeds_then_child_interrupted() {
    // GIVEN: A long-running fake server behind a slow launch
    let dir = tempdir().unwrap();
    let binary = fake_server(&dir, "exec sleep 4");
    let server = Arc::new(SlowStart {
        inner: ProcessServer::new(binary).with_launch_probe_max_elapsed(PROBE_MAX_ELAPSED),
        delay: Duration::from_millis(300),
    });
    let registry = Arc::new(InstanceRegistry::new());
    let (sink, mut rx) = signal_channel();
    let mut handle = build_handle(3, dir.path(), &server, &registry, &sink);
    handle.start().unwrap();

    let deadline = Instant::now() + EVENT_TIMEOUT;
    while handle.state() != HandleState::Running {
        assert!(Instant::now() < deadline, "handle never reached Running");
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(server.inner.child_pid(), None);

    // WHEN: Stopping inside the window
    let stopped_at = Instant::now();
    assert!(handle.request_graceful_stop());
    let event = next_event(&mut rx).await;

    // THEN: TERMINATED well before the child would have exited by itself
    assert_eq!(event.signal, ServerSignal::Terminated);
    assert!(
        stopped_at.elapsed() < Duration::from_secs(2),
        "stop took {:?}",
        stopped_at.elapsed()
    );
    assert_eq!(handle.join().unwrap(), HandleState::Terminated);
}

/// **VALUE**: A launch whose token is already requested interrupts its child at once.
#[test]
#[serial]
fn given_requested_token_when_launching_then_child_interrupted_and_status_graceful() {
    // GIVEN: A token requested before launch
    let dir = tempdir().unwrap();
    let binary = fake_server(&dir, "exec sleep 4");
    let server = ProcessServer::new(binary).with_launch_probe_max_elapsed(PROBE_MAX_ELAPSED);
    let shutdown = ShutdownToken::new();
    shutdown.request();
    let request = LaunchRequest::new(dir.path().join("lighttpd.conf"), dir.path().join("error.log"));

    // WHEN: Launching
    let started = Instant::now();
    let status = server
        .launch(
            &request,
            LaunchedNotifier::new(Arc::new(InstanceRegistry::new())),
            &shutdown,
        )
        .unwrap();

    // THEN: Graceful status, long before the sleep ends
    assert_eq!(status, 0);
    assert!(started.elapsed() < Duration::from_secs(2));
}

/// **VALUE**: A stop request while the backend is idle does not affect a later launch.
///
/// **BUG THIS CATCHES**: Would catch stop state leaking across launches on a shared
/// backend.
#[test]
#[serial]
fn given_idle_shutdown_request_when_next_launch_runs_then_it_is_not_interrupted() {
    // GIVEN: A backend that was asked to stop while idle
    let dir = tempdir().unwrap();
    let binary = fake_server(&dir, "trap 'exit 0' INT\nsleep 0.3\nexit 5");
    let server = ProcessServer::new(binary).with_launch_probe_max_elapsed(PROBE_MAX_ELAPSED);
    server.request_shutdown();

    // WHEN: Launching with a fresh token
    let registry = Arc::new(InstanceRegistry::new());
    let (sink, _rx) = signal_channel();
    registry.try_acquire(4, sink).unwrap();
    let request = LaunchRequest::new(dir.path().join("lighttpd.conf"), dir.path().join("error.log"));
    let status = server
        .launch(
            &request,
            LaunchedNotifier::new(Arc::clone(&registry)),
            &ShutdownToken::new(),
        )
        .unwrap();

    // THEN: The script ran to its own exit
    assert_eq!(status, 5);
}

/// **VALUE**: A missing binary is a native error, not a panic or a hang.
#[test]
#[serial]
fn given_missing_binary_when_launching_then_spawn_error() {
    // GIVEN: A path that does not exist
    let dir = tempdir().unwrap();
    let server = ProcessServer::new(dir.path().join("no-such-lighttpd"));
    let registry = Arc::new(InstanceRegistry::new());
    let request = LaunchRequest::new(dir.path().join("lighttpd.conf"), dir.path().join("error.log"));

    // WHEN: Launching
    let result = server.launch(
        &request,
        LaunchedNotifier::new(registry),
        &ShutdownToken::new(),
    );

    // THEN: Spawn error mentioning the binary
    match result {
        Err(NativeError::Spawn { message, .. }) => assert!(message.contains("no-such-lighttpd")),
        other => panic!("expected spawn error, got {other:?}"),
    }
    assert_eq!(server.child_pid(), None);
}
