// Unit tests for handle module private helpers.
// Lifecycle behavior is covered through the public API in integration_tests/handle.rs

use crate::error::native::NativeError;
use crate::handle::{HandleState, ServerHandle, panic_message};
use crate::native::{LaunchRequest, NativeServer, ShutdownToken};
use crate::registry::{InstanceRegistry, LaunchedNotifier};
use crate::signal::{ServerSignal, signal_channel};

use std::panic::catch_unwind;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts calls; `launch` returns immediately.
#[derive(Default)]
struct CountingNative {
    launches: AtomicUsize,
    shutdown_requests: AtomicUsize,
}

impl NativeServer for CountingNative {
    fn launch(
        &self,
        _request: &LaunchRequest,
        _launched: LaunchedNotifier,
        _shutdown: &ShutdownToken,
    ) -> Result<i32, NativeError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }

    fn request_shutdown(&self) {
        self.shutdown_requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// **VALUE**: A panicking native call is reported to the owner as a crash message.
///
/// **BUG THIS CATCHES**: Would catch the payload downcast missing formatted panics
/// (`String`) or literal panics (`&str`), which would hide the real cause behind
/// the fallback text.
#[test]
fn given_str_and_string_payloads_when_extracting_message_then_returns_text() {
    // GIVEN: A literal panic and a formatted panic
    let literal = catch_unwind(|| panic!("config missing")).unwrap_err();
    let formatted = catch_unwind(|| panic!("bad status {}", 17)).unwrap_err();

    // WHEN / THEN: Both yield their text
    assert_eq!(panic_message(literal.as_ref()), "config missing");
    assert_eq!(panic_message(formatted.as_ref()), "bad status 17");
}

/// **VALUE**: Non-string panic payloads still produce a usable crash message.
#[test]
fn given_opaque_payload_when_extracting_message_then_returns_fallback() {
    // GIVEN: A panic carrying a non-string payload
    let payload = catch_unwind(|| std::panic::panic_any(42_u8)).unwrap_err();

    // WHEN / THEN: The fallback message is used
    assert_eq!(panic_message(payload.as_ref()), "Native server panicked");
}

/// **VALUE**: A stop that lands while the handle is still `Starting` cancels the run.
///
/// **WHY THIS MATTERS**: The owner may stop a server before its thread got going;
/// the server must then never come up and the registry must be left free.
///
/// **BUG THIS CATCHES**: Would catch the runner ignoring the stop token and
/// launching anyway, or forgetting to release the registry on the cancel path.
#[test]
fn given_stop_while_starting_when_runner_proceeds_then_terminated_without_launch() {
    // GIVEN: A handle moved to Starting, its runner not yet run
    let registry = Arc::new(InstanceRegistry::new());
    let native = Arc::new(CountingNative::default());
    let (sink, mut rx) = signal_channel();
    let handle = ServerHandle::builder()
        .with_id(12)
        .with_config_path("/srv/lighttpd.conf")
        .with_errlog_path("/srv/error.log")
        .with_signal_sink(sink)
        .with_native(Arc::clone(&native) as Arc<dyn NativeServer>)
        .with_registry(Arc::clone(&registry))
        .build()
        .unwrap();
    let runner = handle.begin().unwrap();
    assert_eq!(handle.state(), HandleState::Starting);

    // WHEN: Stopping, then letting the runner proceed
    assert!(handle.request_graceful_stop());
    runner.run();

    // THEN: TERMINATED, no launch, no native shutdown, registry empty
    let event = rx.try_recv().unwrap();
    assert_eq!(event.server_id, 12);
    assert_eq!(event.signal, ServerSignal::Terminated);
    assert!(rx.try_recv().is_err());
    assert_eq!(handle.state(), HandleState::Terminated);
    assert_eq!(native.launches.load(Ordering::SeqCst), 0);
    assert_eq!(native.shutdown_requests.load(Ordering::SeqCst), 0);
    assert_eq!(registry.active_id(), None);
}

/// **VALUE**: After a run ends, a late stop request no longer reaches the native server.
///
/// **BUG THIS CATCHES**: Would catch the handle staying `Running` after `launch`
/// returned, letting a late stop interrupt whatever the shared backend runs next.
#[test]
fn given_finished_run_when_stop_requested_then_native_not_called() {
    // GIVEN: A handle whose run has completed on this thread
    let registry = Arc::new(InstanceRegistry::new());
    let native = Arc::new(CountingNative::default());
    let (sink, mut rx) = signal_channel();
    let handle = ServerHandle::builder()
        .with_id(13)
        .with_config_path("/srv/lighttpd.conf")
        .with_errlog_path("/srv/error.log")
        .with_signal_sink(sink)
        .with_native(Arc::clone(&native) as Arc<dyn NativeServer>)
        .with_registry(Arc::clone(&registry))
        .build()
        .unwrap();
    handle.begin().unwrap().run();
    assert_eq!(rx.try_recv().unwrap().signal, ServerSignal::Terminated);

    // WHEN: Stopping late
    let requested = handle.request_graceful_stop();

    // THEN: Ignored
    assert!(!requested);
    assert_eq!(native.launches.load(Ordering::SeqCst), 1);
    assert_eq!(native.shutdown_requests.load(Ordering::SeqCst), 0);
}
