use crate::ErrorLocation;

use std::panic::Location;

#[track_caller]
fn here() -> ErrorLocation {
    ErrorLocation::from(Location::caller())
}

/// **VALUE**: Every error in the workspace prints its origin through this type.
///
/// **BUG THIS CATCHES**: Would catch a Display change that drops the brackets or
/// one of the file/line/column parts, which would make crash messages relayed
/// to the host owner lose their origin.
#[test]
fn given_captured_location_when_displayed_then_renders_file_line_column_in_brackets() {
    // GIVEN: A location captured at this call site
    let location = here();

    // WHEN: Rendering it
    let rendered = location.to_string();

    // THEN: "[file:line:column]"
    assert_eq!(
        rendered,
        format!("[{}:{}:{}]", location.file, location.line, location.column)
    );
    assert!(rendered.contains("error_location.rs"));
}

/// **VALUE**: `#[track_caller]` must carry the caller's position through helpers.
///
/// **BUG THIS CATCHES**: Would catch the helper reporting its own line, which would
/// make every error constructed through a helper point at the same place.
#[test]
fn given_two_call_sites_when_captured_then_lines_differ() {
    // GIVEN / WHEN: Two captures on consecutive lines
    let first = here();
    let second = here();

    // THEN: Same file, consecutive lines
    assert_eq!(first.file, second.file);
    assert_eq!(first.line + 1, second.line);
}

/// **VALUE**: Errors are serialized into JSON event lines by the host.
///
/// **BUG THIS CATCHES**: Would catch the serde derive being dropped or renamed fields.
#[test]
fn given_location_when_serialized_then_exposes_named_fields() {
    // GIVEN: A location
    let location = here();

    // WHEN: Serializing to JSON
    let json = serde_json::to_value(location).unwrap();

    // THEN: file, line and column are present
    assert_eq!(json["line"], location.line);
    assert_eq!(json["column"], location.column);
    assert!(json["file"].as_str().unwrap().ends_with("error_location.rs"));
}
