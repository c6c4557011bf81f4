use server_core::config::{CONFIG_FILE_NAME, CONFIG_VERSION, HostConfig, LogLevel};
use server_core::error::config::ConfigError;

use std::path::PathBuf;

use log::LevelFilter;
use tempfile::tempdir;

/// **VALUE**: First run works without any config file.
#[test]
fn given_missing_config_file_when_loading_then_defaults_returned() {
    // GIVEN: An empty directory
    let dir = tempdir().unwrap();

    // WHEN: Loading
    let config = HostConfig::load(dir.path()).unwrap();

    // THEN: Defaults
    assert_eq!(config, HostConfig::default());
    assert_eq!(config.version, CONFIG_VERSION);
    assert_eq!(config.server.binary, PathBuf::from("lighttpd"));
    assert_eq!(config.server.launch_probe_secs, 10);
    assert_eq!(config.supervisor.max_restarts, 0);
    assert_eq!(*config.logging.level, LevelFilter::Info);
}

/// **VALUE**: Saved settings survive a reload and no temp file is left behind.
///
/// **BUG THIS CATCHES**: Would catch the atomic write leaving `.tmp` files or a field
/// not being serialized.
#[test]
fn given_custom_config_when_saved_and_loaded_then_round_trips() {
    // GIVEN: A customized config
    let dir = tempdir().unwrap();
    let mut config = HostConfig::default();
    config.server.binary = PathBuf::from("/usr/sbin/lighttpd");
    config.server.config_path = PathBuf::from("/etc/lighttpd/lighttpd.conf");
    config.supervisor.max_restarts = 3;
    config.logging.level = LogLevel(LevelFilter::Debug);

    // WHEN: Saving then loading
    config.save(dir.path()).unwrap();
    let loaded = HostConfig::load(dir.path()).unwrap();

    // THEN: Identical, no temp file
    assert_eq!(loaded, config);
    assert!(dir.path().join(CONFIG_FILE_NAME).exists());
    assert!(
        !dir
            .path()
            .join(format!("{CONFIG_FILE_NAME}.tmp"))
            .exists()
    );
}

/// **VALUE**: Partial files fill in missing sections from defaults.
#[test]
fn given_partial_config_file_when_loading_then_missing_fields_defaulted() {
    // GIVEN: Only the supervisor section
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        r#"{"supervisor": {"max_restarts": 5}, "logging": {"level": "LOUD"}}"#,
    )
    .unwrap();

    // WHEN: Loading
    let config = HostConfig::load(dir.path()).unwrap();

    // THEN: Given value kept, rest defaulted, unknown level falls back to info
    assert_eq!(config.supervisor.max_restarts, 5);
    assert_eq!(config.supervisor.restart_backoff_max_secs, 30);
    assert_eq!(config.server, HostConfig::default().server);
    assert_eq!(*config.logging.level, LevelFilter::Info);
}

/// **VALUE**: Corrupt files are reported, not silently replaced.
#[test]
fn given_invalid_json_when_loading_then_parse_error() {
    // GIVEN: Garbage in the config file
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{ not json").unwrap();

    // WHEN: Loading
    let result = HostConfig::load(dir.path());

    // THEN: Parse error naming the file
    match result {
        Err(ConfigError::Parse { path, .. }) => {
            assert_eq!(path, dir.path().join(CONFIG_FILE_NAME))
        }
        other => panic!("expected parse error, got {other:?}"),
    }
}

/// **VALUE**: Values that could never work are rejected on load and save.
///
/// **BUG THIS CATCHES**: Would catch a bad value reaching disk, or the error not
/// naming which field to fix.
#[test]
fn given_invalid_values_when_validating_then_error_names_field() {
    let mut empty_binary = HostConfig::default();
    empty_binary.server.binary = PathBuf::new();

    let mut empty_errlog = HostConfig::default();
    empty_errlog.server.errlog_path = PathBuf::new();

    let mut zero_probe = HostConfig::default();
    zero_probe.server.launch_probe_secs = 0;

    let mut zero_backoff = HostConfig::default();
    zero_backoff.supervisor.restart_backoff_max_secs = 0;

    let cases = [
        (empty_binary, "server.binary"),
        (empty_errlog, "server.errlog_path"),
        (zero_probe, "server.launch_probe_secs"),
        (zero_backoff, "supervisor.restart_backoff_max_secs"),
    ];

    for (config, expected_field) in cases {
        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected_field),
            other => panic!("expected {expected_field} to be rejected, got {other:?}"),
        }

        let dir = tempdir().unwrap();
        assert!(config.save(dir.path()).is_err());
        assert!(!dir.path().join(CONFIG_FILE_NAME).exists());
    }
}

/// **VALUE**: A file from a newer lighttpd-host is refused with both versions named.
///
/// **WHY THIS MATTERS**: Silently reading a newer layout could drop settings the
/// user relies on.
#[test]
fn given_newer_version_on_disk_when_loading_then_unsupported_version() {
    // GIVEN: A config file one version ahead
    let dir = tempdir().unwrap();
    let mut newer = serde_json::to_value(HostConfig::default()).unwrap();
    newer["version"] = serde_json::json!(CONFIG_VERSION + 1);
    std::fs::write(dir.path().join(CONFIG_FILE_NAME), newer.to_string()).unwrap();

    // WHEN: Loading
    let err = HostConfig::load(dir.path()).unwrap_err();

    // THEN: Both versions reported
    match &err {
        ConfigError::UnsupportedVersion { found, supported, .. } => {
            assert_eq!(*found, CONFIG_VERSION + 1);
            assert_eq!(*supported, CONFIG_VERSION);
        }
        other => panic!("expected unsupported version, got {other:?}"),
    }
    assert!(err.to_string().starts_with("Config Version Error: version 2"), "{err}");
}
