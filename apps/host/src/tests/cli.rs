// Unit tests for command-line parsing and overrides

use crate::cli::{APP_DIR_NAME, Cli};

use crate::error::HostError;

use server_core::config::{CONFIG_FILE_NAME, HostConfig};

use std::fs::write;
use std::path::{Path, PathBuf};

use clap::Parser;
use tempfile::tempdir;

/// **VALUE**: Flags override the config file, and only the flags given.
///
/// **BUG THIS CATCHES**: Would catch an absent flag resetting a configured value.
#[test]
fn given_some_flags_when_applying_overrides_then_only_those_fields_change() {
    // GIVEN: A config with a custom errlog and flags for binary and restarts
    let mut config = HostConfig::default();
    config.server.errlog_path = PathBuf::from("/var/log/lighttpd/error.log");
    let cli = Cli::try_parse_from([
        "lighttpd-host",
        "--binary",
        "/usr/sbin/lighttpd",
        "--max-restarts",
        "4",
    ])
    .unwrap();

    // WHEN: Applying overrides
    cli.apply_overrides(&mut config);

    // THEN: Given flags applied, others untouched
    assert_eq!(config.server.binary, PathBuf::from("/usr/sbin/lighttpd"));
    assert_eq!(config.supervisor.max_restarts, 4);
    assert_eq!(
        config.server.errlog_path,
        PathBuf::from("/var/log/lighttpd/error.log")
    );
    assert_eq!(config.server.config_path, HostConfig::default().server.config_path);
    assert!(!cli.pretty);
}

/// **VALUE**: Directory flags win over defaults, and logs follow the config dir.
#[test]
fn given_config_dir_flag_when_resolving_dirs_then_flag_used_for_both() {
    // GIVEN: Only --config-dir
    let cli = Cli::try_parse_from(["lighttpd-host", "--config-dir", "/tmp/host", "--pretty"])
        .unwrap();

    // WHEN: Resolving
    let config_dir = cli.config_dir().unwrap();
    let log_dir = cli.log_dir(&config_dir);

    // THEN: Both point at the flag
    assert_eq!(config_dir, PathBuf::from("/tmp/host"));
    assert_eq!(log_dir, PathBuf::from("/tmp/host"));
    assert!(cli.pretty);
}

/// **VALUE**: Without flags, the platform config dir is used.
#[test]
fn given_no_dir_flags_when_resolving_then_platform_dir_with_app_name() {
    let cli = Cli::try_parse_from(["lighttpd-host", "--log-dir", "/tmp/logs"]).unwrap();

    if let Some(platform_dir) = dirs::config_dir() {
        assert_eq!(cli.config_dir().unwrap(), platform_dir.join(APP_DIR_NAME));
    }
    assert_eq!(cli.log_dir(Path::new("/ignored")), PathBuf::from("/tmp/logs"));
}

/// **VALUE**: Malformed numbers are rejected at parse time.
#[test]
fn given_non_numeric_max_restarts_when_parsing_then_error() {
    let result = Cli::try_parse_from(["lighttpd-host", "--max-restarts", "many"]);

    assert!(result.is_err());
}

/// **VALUE**: Settings resolve without a config file and say so.
///
/// **WHY THIS MATTERS**: The summary logged after logger setup reports whether
/// defaults were used; the loader itself must stay silent because no logger
/// exists yet when it runs.
#[test]
fn given_empty_config_dir_when_resolving_settings_then_defaults_and_not_found() {
    // GIVEN: An empty config directory
    let dir = tempdir().unwrap();
    let cli = Cli::try_parse_from([
        "lighttpd-host",
        "--config-dir",
        dir.path().to_str().unwrap(),
    ])
    .unwrap();

    // WHEN: Resolving settings
    let settings = cli.settings().unwrap();

    // THEN: Defaults, flagged as not found, logs next to the config
    assert!(!settings.config_file_found);
    assert_eq!(settings.config, HostConfig::default());
    assert_eq!(settings.config_dir, dir.path());
    assert_eq!(settings.log_dir, dir.path());
}

/// **VALUE**: Flags are applied on top of the file, and the file is reported found.
///
/// **BUG THIS CATCHES**: Would catch overrides being applied before loading, where
/// the file would silently replace them.
#[test]
fn given_config_file_and_flag_when_resolving_settings_then_flag_wins() {
    // GIVEN: A saved config with a custom binary, and a --max-restarts flag
    let dir = tempdir().unwrap();
    let mut saved = HostConfig::default();
    saved.server.binary = PathBuf::from("/opt/lighttpd/sbin/lighttpd");
    saved.supervisor.max_restarts = 2;
    saved.save(dir.path()).unwrap();
    let cli = Cli::try_parse_from([
        "lighttpd-host",
        "--config-dir",
        dir.path().to_str().unwrap(),
        "--max-restarts",
        "7",
    ])
    .unwrap();

    // WHEN: Resolving settings
    let settings = cli.settings().unwrap();

    // THEN: File values kept, flag applied
    assert!(settings.config_file_found);
    assert_eq!(
        settings.config.server.binary,
        PathBuf::from("/opt/lighttpd/sbin/lighttpd")
    );
    assert_eq!(settings.config.supervisor.max_restarts, 7);
}

/// **VALUE**: A broken config file stops startup with a config error.
#[test]
fn given_malformed_config_file_when_resolving_settings_then_config_error() {
    let dir = tempdir().unwrap();
    write(dir.path().join(CONFIG_FILE_NAME), "{ not json").unwrap();
    let cli = Cli::try_parse_from([
        "lighttpd-host",
        "--config-dir",
        dir.path().to_str().unwrap(),
    ])
    .unwrap();

    let result = cli.settings();

    assert!(matches!(result, Err(HostError::Config(_))), "{result:?}");
}
