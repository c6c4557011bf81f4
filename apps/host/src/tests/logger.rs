// Unit tests for logger module initialization logic
// Tests focus on thread-safety and error handling

use crate::error::HostError;
use crate::logger::{LOG_FILE_NAME, initialize, open_log_file};

use std::path::PathBuf;

use log::LevelFilter;

/// **VALUE**: Verifies that calling initialize() multiple times doesn't panic or fail.
///
/// **WHY THIS MATTERS**: Logger initialization can be reached from several code paths
/// (main, tests). If it errors on the second call, startup fails for no reason.
///
/// **BUG THIS CATCHES**: Would catch if the Once or AtomicBool guards are removed,
/// causing fern to fail when trying to set a global logger twice.
#[test]
fn given_logger_initialized_when_called_again_then_returns_ok() {
    // GIVEN: A valid temporary directory
    let temp_dir = tempfile::tempdir().unwrap();

    // WHEN: Calling initialize twice
    let result1 = initialize(temp_dir.path(), LevelFilter::Debug);
    let result2 = initialize(temp_dir.path(), LevelFilter::Trace);

    // THEN: Both should return Ok (second one logs warning but doesn't error)
    assert!(result1.is_ok(), "First initialization should succeed");
    assert!(
        result2.is_ok(),
        "Second initialization should succeed (idempotent)"
    );
}

/// **VALUE**: Verifies that an unusable log directory is a clear error.
///
/// **WHY THIS MATTERS**: If the log directory can't be written (permissions, disk
/// full), startup should report why instead of panicking.
///
/// **BUG THIS CATCHES**: Would catch if `fern::log_file()` is unwrapped instead of
/// mapped to a `HostError::Logger`.
#[test]
fn given_invalid_log_dir_when_opening_log_file_then_returns_logger_error() {
    // GIVEN: A path that can never be a directory
    let invalid_dir = PathBuf::from("/dev/null/invalid-path");

    // WHEN: Opening the log file
    let result = open_log_file(&invalid_dir);

    // THEN: Logger error naming the file
    match result {
        Err(HostError::Logger { message, .. }) => assert!(message.contains(LOG_FILE_NAME)),
        other => panic!("expected logger error, got {other:?}"),
    }
}

/// **VALUE**: The log file is appended to across runs.
#[test]
fn given_existing_log_file_when_opened_again_then_content_kept() {
    // GIVEN: A log file with content
    let temp_dir = tempfile::tempdir().unwrap();
    std::fs::write(temp_dir.path().join(LOG_FILE_NAME), "previous run\n").unwrap();

    // WHEN: Opening it and writing
    let mut file = open_log_file(temp_dir.path()).unwrap();
    std::io::Write::write_all(&mut file, b"this run\n").unwrap();

    // THEN: Both lines present
    let contents = std::fs::read_to_string(temp_dir.path().join(LOG_FILE_NAME)).unwrap();
    assert_eq!(contents, "previous run\nthis run\n");
}
