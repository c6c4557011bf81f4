use server_core::error::registry::RegistryError;
use server_core::{InstanceRegistry, LaunchedNotifier, ServerSignal, signal_channel};

use std::sync::Arc;

/// **VALUE**: The marker is an atomic check-and-set.
///
/// **BUG THIS CATCHES**: Would catch a second acquire overwriting the first, or the
/// same id being allowed to acquire twice.
#[test]
fn given_held_marker_when_acquiring_again_then_already_active_with_holder_id() {
    // GIVEN: Server 1 holds the marker
    let registry = InstanceRegistry::new();
    let (sink, _rx) = signal_channel();
    registry.try_acquire(1, sink.clone()).unwrap();

    // WHEN: Server 2, then server 1 again, try to acquire
    let other = registry.try_acquire(2, sink.clone());
    let same = registry.try_acquire(1, sink);

    // THEN: Both rejected, holder unchanged
    assert!(matches!(
        other,
        Err(RegistryError::AlreadyActive { active_id: 1, .. })
    ));
    assert!(matches!(
        same,
        Err(RegistryError::AlreadyActive { active_id: 1, .. })
    ));
    assert_eq!(registry.active_id(), Some(1));
}

/// **VALUE**: Only the holder can clear the marker.
///
/// **BUG THIS CATCHES**: Would catch a rejected handle clearing the marker of the
/// server that rejected it.
#[test]
fn given_held_marker_when_non_holder_releases_then_marker_kept() {
    // GIVEN: Server 1 holds the marker
    let registry = InstanceRegistry::new();
    let (sink, _rx) = signal_channel();
    registry.try_acquire(1, sink.clone()).unwrap();

    // WHEN / THEN: Server 2 cannot release it, server 1 can
    assert!(!registry.release(2));
    assert!(registry.is_active(1));
    assert!(registry.release(1));
    assert_eq!(registry.active_id(), None);
    assert!(!registry.release(1));

    // AND: The marker is free for the next server
    registry.try_acquire(2, sink).unwrap();
    assert!(registry.is_active(2));
}

/// **VALUE**: The launched callback reaches the active server exactly once.
#[test]
fn given_active_server_when_launched_callback_repeats_then_one_launched_signal() {
    // GIVEN: Server 9 holds the marker
    let registry = Arc::new(InstanceRegistry::new());
    let (sink, mut rx) = signal_channel();
    registry.try_acquire(9, sink).unwrap();
    let notifier = LaunchedNotifier::new(Arc::clone(&registry));

    // WHEN: The callback fires twice
    assert_eq!(notifier.notify().unwrap(), 9);
    assert_eq!(registry.notify_launched().unwrap(), 9);

    // THEN: One LAUNCHED for server 9
    let event = rx.try_recv().unwrap();
    assert_eq!(event.server_id, 9);
    assert_eq!(event.signal, ServerSignal::Launched);
    assert!(rx.try_recv().is_err());
}

/// **VALUE**: A callback outside any run is reported, never a panic.
///
/// **WHY THIS MATTERS**: The callback can be invoked from native code where
/// unwinding across the boundary is undefined behavior.
#[test]
fn given_empty_registry_when_launched_callback_fires_then_no_active_server_error() {
    // GIVEN: Nobody holds the marker
    let registry = InstanceRegistry::new();

    // WHEN: The callback fires
    let result = registry.notify_launched();

    // THEN: Typed error
    assert!(matches!(result, Err(RegistryError::NoActiveServer { .. })));
}

/// **VALUE**: A new run gets its own LAUNCHED even after a previous run launched.
#[test]
fn given_previous_run_launched_when_next_server_acquires_then_launched_fires_again() {
    // GIVEN: Server 1 launched and released
    let registry = InstanceRegistry::new();
    let (sink, mut rx) = signal_channel();
    registry.try_acquire(1, sink.clone()).unwrap();
    registry.notify_launched().unwrap();
    registry.release(1);

    // WHEN: Server 2 acquires and launches
    registry.try_acquire(2, sink).unwrap();
    registry.notify_launched().unwrap();

    // THEN: Two LAUNCHED events, one per server
    let ids: Vec<u64> = std::iter::from_fn(|| rx.try_recv().ok())
        .map(|e| e.server_id)
        .collect();
    assert_eq!(ids, vec![1, 2]);
}
