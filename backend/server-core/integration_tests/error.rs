use server_core::error::CoreError;
use server_core::error::handle::HandleError;
use server_core::{NativeServer, ServerHandle, signal_channel};

use crate::helpers::ScriptedNative;

use std::sync::Arc;

/// **VALUE**: Every error message carries the source location that raised it.
///
/// **WHY THIS MATTERS**: Crash messages end up in logs with no stack trace; the
/// location is often the only pointer to what failed.
#[test]
fn given_handle_error_when_displayed_then_message_and_location_included() {
    // GIVEN: A started handle
    let (sink, _rx) = signal_channel();
    let mut handle = ServerHandle::builder()
        .with_id(77)
        .with_config_path("/srv/lighttpd.conf")
        .with_errlog_path("/srv/error.log")
        .with_signal_sink(sink)
        .with_native(Arc::new(ScriptedNative::new()) as Arc<dyn NativeServer>)
        .with_registry(Arc::new(server_core::InstanceRegistry::new()))
        .build()
        .unwrap();

    // WHEN: Joining before starting
    let error = handle.join().unwrap_err();
    let text = error.to_string();

    // THEN: Message and [file:line:column]
    assert!(matches!(error, HandleError::NotStarted { .. }));
    assert!(text.contains("server 77 was never started"), "{text}");
    assert!(text.contains("error.rs:"), "location missing: {text}");
    assert!(text.ends_with(']'), "{text}");
}

/// **VALUE**: The umbrella error is transparent, so callers see the inner text.
#[test]
fn given_inner_error_when_wrapped_in_core_error_then_display_unchanged() {
    // GIVEN: A builder validation error
    let inner = ServerHandle::builder().build().unwrap_err();
    let inner_text = inner.to_string();

    // WHEN: Converting
    let wrapped = CoreError::from(inner);

    // THEN: Same text
    assert_eq!(wrapped.to_string(), inner_text);
    assert!(inner_text.starts_with("Validation Error: Server id is required"));
}
