use crate::helpers::{ScriptedNative, Step, next_event};

use server_core::error::handle::HandleError;
use server_core::{
    ANOTHER_INSTANCE_ACTIVE_MESSAGE, HandleState, InstanceRegistry, NativeServer, ServerHandle,
    ServerSignal, SignalSink, signal_channel,
};

use std::path::PathBuf;
use std::sync::{Arc, Barrier};
use std::thread;

use serial_test::serial;

// ============================================================================
// Public API tests for the managed server handle.
// Every test uses a private registry so tests can run in parallel.
// ============================================================================

fn build_handle(
    id: u64,
    sink: &SignalSink,
    native: &Arc<ScriptedNative>,
    registry: &Arc<InstanceRegistry>,
) -> ServerHandle {
    ServerHandle::builder()
        .with_id(id)
        .with_config_path(format!("/srv/{id}/lighttpd.conf"))
        .with_errlog_path(format!("/srv/{id}/error.log"))
        .with_signal_sink(sink.clone())
        .with_native(Arc::clone(native) as Arc<dyn NativeServer>)
        .with_registry(Arc::clone(registry))
        .build()
        .unwrap()
}

/// **VALUE**: The full happy path: launch, ready, graceful exit.
///
/// **WHY THIS MATTERS**: This is the sequence every owner relies on to know when the
/// server can be used and when it is safe to start another.
///
/// **BUG THIS CATCHES**: Would catch LAUNCHED being lost, TERMINATED being sent before
/// the registry is cleared, or the paths not reaching the native call.
#[tokio::test]
async fn given_started_handle_when_native_launches_and_exits_zero_then_launched_then_terminated() {
    // GIVEN: A handle on a scripted native server
    let registry = Arc::new(InstanceRegistry::new());
    let native = Arc::new(ScriptedNative::new());
    let (sink, mut rx) = signal_channel();
    let mut handle = build_handle(1, &sink, &native, &registry);

    // WHEN: Starting it, signalling readiness, then exiting with 0
    handle.start().unwrap();
    let request = native.wait_for_launch();
    assert_eq!(request.config_path, PathBuf::from("/srv/1/lighttpd.conf"));
    assert_eq!(request.errlog_path, PathBuf::from("/srv/1/error.log"));
    assert!(registry.is_active(1));
    assert!(handle.is_active());

    native.push(Step::Launched);
    let launched = next_event(&mut rx).await;
    native.push(Step::Exit(0));
    let terminal = next_event(&mut rx).await;

    // THEN: LAUNCHED then TERMINATED, registry empty
    assert_eq!(launched.server_id, 1);
    assert_eq!(launched.signal, ServerSignal::Launched);
    assert_eq!(terminal.signal, ServerSignal::Terminated);
    assert_eq!(registry.active_id(), None);
    assert_eq!(handle.join().unwrap(), HandleState::Terminated);
    assert!(!handle.is_active());
}

/// **VALUE**: Only one server may run at a time.
///
/// **WHY THIS MATTERS**: The wrapped server keeps global state; two copies in one
/// process corrupt each other.
///
/// **BUG THIS CATCHES**: Would catch the second handle reaching the native launch,
/// or the rejection clearing the first handle's marker.
#[tokio::test]
async fn given_active_handle_when_second_handle_starts_then_second_crashes_without_launching() {
    // GIVEN: Handle A running
    let registry = Arc::new(InstanceRegistry::new());
    let native = Arc::new(ScriptedNative::new());
    let (sink, mut rx) = signal_channel();
    let mut a = build_handle(1, &sink, &native, &registry);
    a.start().unwrap();
    native.wait_for_launch();

    // WHEN: Handle B starts
    let mut b = build_handle(2, &sink, &native, &registry);
    b.start().unwrap();
    let event = next_event(&mut rx).await;

    // THEN: B crashes with the single-instance message, A untouched
    assert_eq!(event.server_id, 2);
    assert_eq!(event.signal, ServerSignal::crashed(ANOTHER_INSTANCE_ACTIVE_MESSAGE));
    assert_eq!(b.join().unwrap(), HandleState::Rejected);
    assert_eq!(native.launches(), 1, "B must never reach the native launch");
    assert!(registry.is_active(1), "A must still hold the registry");

    // Cleanup: stop A
    assert!(a.request_graceful_stop());
    assert_eq!(next_event(&mut rx).await.signal, ServerSignal::Terminated);
    assert_eq!(a.join().unwrap(), HandleState::Terminated);
}

/// **VALUE**: Handles started at the same instant still produce exactly one server.
///
/// **WHY THIS MATTERS**: Owners on different threads may start handles together;
/// the single-instance rule has to hold under that race, not only when starts are
/// spaced out.
///
/// **BUG THIS CATCHES**: Would catch a check-then-set gap in the registry letting
/// two handles both reach the native launch.
#[tokio::test]
async fn given_many_handles_when_started_simultaneously_then_exactly_one_launches() {
    const HANDLES: u64 = 8;

    // GIVEN: Eight handles on one registry and one native server
    let registry = Arc::new(InstanceRegistry::new());
    let native = Arc::new(ScriptedNative::new());
    let (sink, mut rx) = signal_channel();
    let mut handles: Vec<ServerHandle> = (1..=HANDLES)
        .map(|id| build_handle(id, &sink, &native, &registry))
        .collect();

    // WHEN: All start behind a barrier
    let barrier = Barrier::new(handles.len());
    thread::scope(|scope| {
        for handle in handles.iter_mut() {
            let barrier = &barrier;
            scope.spawn(move || {
                barrier.wait();
                handle.start().unwrap();
            });
        }
    });
    native.wait_for_launch();

    // THEN: Every loser crashes with the single-instance message
    let winner = registry.active_id().expect("one handle must hold the registry");
    for _ in 1..HANDLES {
        let event = next_event(&mut rx).await;
        assert_ne!(event.server_id, winner);
        assert_eq!(event.signal, ServerSignal::crashed(ANOTHER_INSTANCE_ACTIVE_MESSAGE));
    }
    assert_eq!(native.launches(), 1);

    // Cleanup: stop the winner, then every handle settles
    let winning = handles
        .iter()
        .find(|h| h.id() == winner)
        .expect("winner is one of the handles");
    assert!(winning.request_graceful_stop());
    let terminal = next_event(&mut rx).await;
    assert_eq!(terminal.server_id, winner);
    assert_eq!(terminal.signal, ServerSignal::Terminated);

    for handle in handles.iter_mut() {
        let expected = if handle.id() == winner {
            HandleState::Terminated
        } else {
            HandleState::Rejected
        };
        assert_eq!(handle.join().unwrap(), expected);
    }
    assert_eq!(native.launches(), 1);
    assert_eq!(registry.active_id(), None);
}

/// **VALUE**: Failure statuses are reported with the status in the message.
#[tokio::test]
async fn given_running_handle_when_native_returns_17_then_crashed_mentions_status() {
    // GIVEN: A running handle
    let registry = Arc::new(InstanceRegistry::new());
    let native = Arc::new(ScriptedNative::new());
    let (sink, mut rx) = signal_channel();
    let mut handle = build_handle(3, &sink, &native, &registry);
    handle.start().unwrap();
    native.wait_for_launch();

    // WHEN: The native call returns 17
    native.push(Step::Exit(17));
    let event = next_event(&mut rx).await;

    // THEN: CRASHED referencing 17, registry cleared
    assert_eq!(event.signal.name(), "CRASHED");
    assert!(event.signal.message().unwrap().contains("17"));
    assert_eq!(registry.active_id(), None);
    assert_eq!(handle.join().unwrap(), HandleState::Crashed);
}

/// **VALUE**: Errors and panics inside the native call never escape the handle's thread.
///
/// **BUG THIS CATCHES**: Would catch a panic killing the thread without a terminal
/// signal or without releasing the registry, leaving the owner unable to restart.
#[tokio::test]
async fn given_native_error_or_panic_when_running_then_crashed_and_registry_cleared() {
    let registry = Arc::new(InstanceRegistry::new());
    let native = Arc::new(ScriptedNative::new());
    let (sink, mut rx) = signal_channel();

    // GIVEN / WHEN: A native error
    let mut failing = build_handle(4, &sink, &native, &registry);
    failing.start().unwrap();
    native.wait_for_launch();
    native.push(Step::Fail(String::from("bind: address in use")));
    let failed = next_event(&mut rx).await;

    // THEN: CRASHED carrying the error text
    assert!(
        failed
            .signal
            .message()
            .unwrap()
            .contains("bind: address in use")
    );
    assert_eq!(failing.join().unwrap(), HandleState::Crashed);

    // GIVEN / WHEN: A panic in a fresh handle
    let mut panicking = build_handle(5, &sink, &native, &registry);
    panicking.start().unwrap();
    native.wait_for_launch();
    native.push(Step::Panic(String::from("segfault stand-in")));
    let panicked = next_event(&mut rx).await;

    // THEN: CRASHED carrying the panic text, thread joined cleanly
    assert_eq!(panicked.server_id, 5);
    assert_eq!(panicked.signal.message(), Some("segfault stand-in"));
    assert_eq!(panicking.join().unwrap(), HandleState::Crashed);
    assert_eq!(registry.active_id(), None);
}

/// **VALUE**: After any terminal signal a new handle can start immediately.
///
/// **BUG THIS CATCHES**: Would catch the marker being cleared after the signal is
/// sent, which makes an owner that restarts on CRASHED get rejected.
#[tokio::test]
async fn given_terminal_signal_when_new_handle_started_immediately_then_not_rejected() {
    // GIVEN: A handle that crashes
    let registry = Arc::new(InstanceRegistry::new());
    let native = Arc::new(ScriptedNative::new());
    let (sink, mut rx) = signal_channel();
    let mut first = build_handle(10, &sink, &native, &registry);
    first.start().unwrap();
    native.wait_for_launch();
    native.push(Step::Exit(1));
    assert_eq!(next_event(&mut rx).await.signal.name(), "CRASHED");

    // WHEN: Starting a replacement right away
    let mut second = build_handle(11, &sink, &native, &registry);
    second.start().unwrap();
    native.wait_for_launch();

    // THEN: The replacement runs
    assert!(registry.is_active(11));
    assert!(second.request_graceful_stop());
    let event = next_event(&mut rx).await;
    assert_eq!(event.server_id, 11);
    assert_eq!(event.signal, ServerSignal::Terminated);
    assert_eq!(native.launches(), 2);
}

/// **VALUE**: Stopping a handle that never started is a no-op.
#[tokio::test]
async fn given_unstarted_handle_when_stop_requested_then_nothing_happens() {
    // GIVEN: A handle never started
    let registry = Arc::new(InstanceRegistry::new());
    let native = Arc::new(ScriptedNative::new());
    let (sink, mut rx) = signal_channel();
    let handle = build_handle(20, &sink, &native, &registry);

    // WHEN: Requesting a stop
    let requested = handle.request_graceful_stop();

    // THEN: No request, no signal, no native shutdown
    assert!(!requested);
    assert_eq!(handle.state(), HandleState::Created);
    assert_eq!(native.shutdown_requests(), 0);
    assert!(rx.try_recv().is_err());
}

/// **VALUE**: Graceful stop goes through the native shutdown primitive and the
/// terminal signal comes from the run itself.
#[tokio::test]
async fn given_running_handle_when_stop_requested_then_native_shutdown_and_terminated() {
    // GIVEN: A launched handle
    let registry = Arc::new(InstanceRegistry::new());
    let native = Arc::new(ScriptedNative::new());
    let (sink, mut rx) = signal_channel();
    let mut handle = build_handle(21, &sink, &native, &registry);
    handle.start().unwrap();
    native.wait_for_launch();
    native.push(Step::Launched);
    assert_eq!(next_event(&mut rx).await.signal, ServerSignal::Launched);

    // WHEN: Stopping it
    assert!(handle.request_graceful_stop());
    let event = next_event(&mut rx).await;

    // THEN: One native shutdown request, TERMINATED, later stops ignored
    assert_eq!(native.shutdown_requests(), 1);
    assert_eq!(event.signal, ServerSignal::Terminated);
    assert_eq!(handle.join().unwrap(), HandleState::Terminated);
    assert!(!handle.request_graceful_stop());
    assert_eq!(native.shutdown_requests(), 1);
}

/// **VALUE**: Handles are single-use.
#[tokio::test]
async fn given_started_handle_when_started_again_then_already_started_error() {
    // GIVEN: A started handle
    let registry = Arc::new(InstanceRegistry::new());
    let native = Arc::new(ScriptedNative::new());
    let (sink, mut rx) = signal_channel();
    let mut handle = build_handle(30, &sink, &native, &registry);
    handle.start().unwrap();
    native.wait_for_launch();

    // WHEN: Starting a second time
    let result = handle.start();

    // THEN: Rejected with AlreadyStarted, still exactly one launch
    assert!(matches!(
        result,
        Err(HandleError::AlreadyStarted { server_id: 30, .. })
    ));
    native.push(Step::Exit(0));
    assert_eq!(next_event(&mut rx).await.signal, ServerSignal::Terminated);
    handle.join().unwrap();

    // AND: A finished handle cannot be restarted either
    assert!(matches!(
        handle.start(),
        Err(HandleError::AlreadyStarted { .. })
    ));
    assert_eq!(native.launches(), 1);
}

/// **VALUE**: Joining a never-started handle reports a typed error instead of hanging.
#[test]
fn given_unstarted_handle_when_joined_then_not_started_error() {
    let registry = Arc::new(InstanceRegistry::new());
    let native = Arc::new(ScriptedNative::new());
    let (sink, _rx) = signal_channel();
    let mut handle = build_handle(31, &sink, &native, &registry);

    assert!(matches!(
        handle.join(),
        Err(HandleError::NotStarted { server_id: 31, .. })
    ));
}

/// **VALUE**: LAUNCHED is delivered at most once, always before the terminal signal.
///
/// **BUG THIS CATCHES**: Would catch duplicate readiness callbacks from the native
/// layer reaching the owner twice.
#[tokio::test]
async fn given_repeated_launched_callbacks_when_running_then_owner_sees_one_launched() {
    // GIVEN: A running handle
    let registry = Arc::new(InstanceRegistry::new());
    let native = Arc::new(ScriptedNative::new());
    let (sink, mut rx) = signal_channel();
    let mut handle = build_handle(40, &sink, &native, &registry);
    handle.start().unwrap();
    native.wait_for_launch();

    // WHEN: The native layer reports readiness twice, then exits
    native.push(Step::Launched);
    native.push(Step::Launched);
    native.push(Step::Exit(0));
    handle.join().unwrap();

    // THEN: Exactly LAUNCHED, TERMINATED
    let mut names = Vec::new();
    while let Ok(event) = rx.try_recv() {
        names.push(event.signal.name());
    }
    assert_eq!(names, vec!["LAUNCHED", "TERMINATED"]);
}

/// **VALUE**: Builder validation rejects handles that could never launch.
#[test]
fn given_missing_or_empty_fields_when_building_then_validation_error() {
    let native: Arc<dyn NativeServer> = Arc::new(ScriptedNative::new());
    let (sink, _rx) = signal_channel();

    let missing_id = ServerHandle::builder()
        .with_config_path("/srv/lighttpd.conf")
        .with_errlog_path("/srv/error.log")
        .with_signal_sink(sink.clone())
        .with_native(Arc::clone(&native))
        .build();
    let empty_config = ServerHandle::builder()
        .with_id(1)
        .with_config_path("")
        .with_errlog_path("/srv/error.log")
        .with_signal_sink(sink.clone())
        .with_native(Arc::clone(&native))
        .build();
    let missing_native = ServerHandle::builder()
        .with_id(1)
        .with_config_path("/srv/lighttpd.conf")
        .with_errlog_path("/srv/error.log")
        .with_signal_sink(sink)
        .build();

    for (result, expected) in [
        (missing_id, "Server id is required"),
        (empty_config, "Config path cannot be empty"),
        (missing_native, "Native server is required"),
    ] {
        match result {
            Err(HandleError::Validation { message, .. }) => assert_eq!(message, expected),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}

/// **VALUE**: Handles built without an explicit registry share the process-wide one.
///
/// **BUG THIS CATCHES**: Would catch the builder defaulting to a fresh registry per
/// handle, which silently disables the single-instance rule.
#[tokio::test]
#[serial]
async fn given_default_registry_when_two_handles_start_then_second_rejected_by_global_marker() {
    // GIVEN: Two handles without an injected registry
    let native = Arc::new(ScriptedNative::new());
    let (sink, mut rx) = signal_channel();
    let build = |id: u64| {
        ServerHandle::builder()
            .with_id(id)
            .with_config_path("/srv/global/lighttpd.conf")
            .with_errlog_path("/srv/global/error.log")
            .with_signal_sink(sink.clone())
            .with_native(Arc::clone(&native) as Arc<dyn NativeServer>)
            .build()
            .unwrap()
    };
    let mut first = build(100);
    let mut second = build(101);

    // WHEN: Both start
    first.start().unwrap();
    native.wait_for_launch();
    assert!(InstanceRegistry::global().is_active(100));
    second.start().unwrap();
    let rejected = next_event(&mut rx).await;

    // THEN: The second is rejected and the global marker clears after the first stops
    assert_eq!(rejected.server_id, 101);
    assert_eq!(second.join().unwrap(), HandleState::Rejected);
    assert!(first.request_graceful_stop());
    assert_eq!(next_event(&mut rx).await.signal, ServerSignal::Terminated);
    first.join().unwrap();
    assert_eq!(InstanceRegistry::global().active_id(), None);
}
