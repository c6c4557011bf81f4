// Unit tests for error module

use crate::error::HostError;

use server_core::error::config::ConfigError;

use common::ErrorLocation;

use std::panic::Location;

/// **VALUE**: Host errors show their message and where they were raised.
///
/// **WHY THIS MATTERS**: The host prints errors just before exiting; the location is
/// the quickest pointer to the failing step.
#[test]
fn given_host_error_when_displayed_then_message_and_location_shown() {
    // GIVEN: A HostError
    let err = HostError::Output {
        message: String::from("Failed to write event: broken pipe"),
        location: ErrorLocation::from(Location::caller()),
    };

    // WHEN: Displaying it
    let text = err.to_string();

    // THEN: Prefix, message and location
    assert!(text.starts_with("Output Error: Failed to write event: broken pipe ["));
    assert!(text.contains("error.rs:"), "{text}");
}

/// **VALUE**: Config errors pass through unchanged.
///
/// **BUG THIS CATCHES**: Would catch the `#[from]` conversion wrapping the text in a
/// second prefix, hiding which setting was wrong.
#[test]
fn given_config_error_when_converted_then_display_is_transparent() {
    // GIVEN: A config validation error
    let inner = ConfigError::Invalid {
        field: "server.binary",
        reason: String::from("cannot be empty"),
        location: ErrorLocation::from(Location::caller()),
    };
    let inner_text = inner.to_string();

    // WHEN: Converting with ?
    let err: HostError = inner.into();

    // THEN: Same text
    assert!(matches!(err, HostError::Config(_)));
    assert_eq!(err.to_string(), inner_text);
}
