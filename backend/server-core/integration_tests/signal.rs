use server_core::{ServerEvent, ServerSignal, signal_channel};

use serde_json::json;

/// **VALUE**: Signal names and messages match what owners match on.
#[test]
fn given_each_signal_when_inspected_then_name_message_and_terminal_flag_match() {
    // GIVEN: One of each signal
    let launched = ServerSignal::Launched;
    let terminated = ServerSignal::Terminated;
    let crashed = ServerSignal::crashed("Native server exited with status 2");

    // THEN: Names, messages, terminal flags
    assert_eq!(launched.name(), "LAUNCHED");
    assert_eq!(terminated.name(), "TERMINATED");
    assert_eq!(crashed.name(), "CRASHED");

    assert_eq!(launched.message(), None);
    assert_eq!(terminated.message(), None);
    assert_eq!(crashed.message(), Some("Native server exited with status 2"));

    assert!(!launched.is_terminal());
    assert!(terminated.is_terminal());
    assert!(crashed.is_terminal());
    assert_eq!(
        crashed.to_string(),
        "CRASHED: Native server exited with status 2"
    );
}

/// **VALUE**: The JSON shape the host prints is stable.
///
/// **WHY THIS MATTERS**: Scripts consuming the host's output parse these lines.
///
/// **BUG THIS CATCHES**: Would catch the flattened tag being renamed or the message
/// field leaking onto non-crash signals.
#[test]
fn given_events_when_serialized_then_flat_json_with_signal_tag() {
    // GIVEN: A launched and a crashed event
    let launched = ServerEvent::new(1, ServerSignal::Launched);
    let crashed = ServerEvent::new(2, ServerSignal::crashed("Another instance is active"));

    // WHEN: Serializing
    let launched_json = serde_json::to_value(&launched).unwrap();
    let crashed_json = serde_json::to_value(&crashed).unwrap();

    // THEN: Flat objects
    assert_eq!(launched_json, json!({"server_id": 1, "signal": "LAUNCHED"}));
    assert_eq!(
        crashed_json,
        json!({"server_id": 2, "signal": "CRASHED", "message": "Another instance is active"})
    );
}

/// **VALUE**: A server must never fail because its owner stopped listening.
#[test]
fn given_dropped_receiver_when_emitting_then_signal_discarded_without_panic() {
    // GIVEN: A sink whose receiver is gone
    let (sink, rx) = signal_channel();
    drop(rx);

    // WHEN: Emitting
    sink.emit(7, ServerSignal::Terminated);

    // THEN: Nothing blew up and the sink reports closed
    assert!(sink.is_closed());
}

/// **VALUE**: Cloned sinks feed one receiver, tagged by server id.
#[tokio::test]
async fn given_cloned_sinks_when_emitting_then_one_receiver_sees_both_in_order() {
    // GIVEN: Two clones of one sink
    let (sink, mut rx) = signal_channel();
    let other = sink.clone();

    // WHEN: Each emits
    sink.emit(1, ServerSignal::Launched);
    other.emit(2, ServerSignal::Terminated);

    // THEN: Both arrive in order
    assert_eq!(rx.recv().await, Some(ServerEvent::new(1, ServerSignal::Launched)));
    assert_eq!(rx.recv().await, Some(ServerEvent::new(2, ServerSignal::Terminated)));
}
