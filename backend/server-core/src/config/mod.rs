//! Host configuration stored as `lighttpd-host.json`.
//!
//! The lighttpd configuration itself is opaque to this crate; only its path is
//! recorded here.

pub mod log_level;

pub use log_level::LogLevel;

use crate::LIGHTTPD_BINARY;
use crate::error::config::ConfigError;

use common::ErrorLocation;

use std::panic::Location;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "lighttpd-host.json";
pub const CONFIG_VERSION: u32 = 1;

const MAX_LAUNCH_PROBE_SECS: u64 = 300;

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_binary")]
    pub binary: PathBuf,
    #[serde(default = "default_config_path")]
    pub config_path: PathBuf,
    #[serde(default = "default_errlog_path")]
    pub errlog_path: PathBuf,
    #[serde(default = "default_launch_probe_secs")]
    pub launch_probe_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            config_path: default_config_path(),
            errlog_path: default_errlog_path(),
            launch_probe_secs: default_launch_probe_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorSection {
    #[serde(default)]
    pub max_restarts: u32,
    #[serde(default = "default_restart_backoff_max_secs")]
    pub restart_backoff_max_secs: u64,
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            max_restarts: 0,
            restart_backoff_max_secs: default_restart_backoff_max_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub level: LogLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub supervisor: SupervisorSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: ServerSection::default(),
            supervisor: SupervisorSection::default(),
            logging: LoggingSection::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_binary() -> PathBuf {
    PathBuf::from(LIGHTTPD_BINARY)
}
fn default_config_path() -> PathBuf {
    PathBuf::from("lighttpd.conf")
}
fn default_errlog_path() -> PathBuf {
    PathBuf::from("lighttpd-error.log")
}
fn default_launch_probe_secs() -> u64 {
    10
}
fn default_restart_backoff_max_secs() -> u64 {
    30
}

// ============================================
// IMPLEMENTATION
// ============================================

impl HostConfig {
    /// Load config from {config_dir}/lighttpd-host.json.
    ///
    /// Does not log: this runs before the logger is configured from the result.
    ///
    /// # Returns
    ///
    /// Returns `Ok(HostConfig)` if loaded successfully or defaults if the file is missing.
    /// Returns `Err(ConfigError)` if the file exists but is unreadable or invalid.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).map_err(|e| ConfigError::Read {
                path: config_path.clone(),
                location: ErrorLocation::from(Location::caller()),
                source: e,
            })?;

        let config: HostConfig =
            serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
                path: config_path.clone(),
                location: ErrorLocation::from(Location::caller()),
                source: e,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Save config to {config_dir}/lighttpd-host.json using temp file + rename.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation, directory creation, serialization,
    /// the write, or the rename fails.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::Write {
            path: config_dir.to_path_buf(),
            location: ErrorLocation::from(Location::caller()),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{CONFIG_FILE_NAME}.tmp"));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize {
            location: ErrorLocation::from(Location::caller()),
            source: e,
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::Write {
            path: temp_path.clone(),
            location: ErrorLocation::from(Location::caller()),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::Write {
            path: config_path.clone(),
            location: ErrorLocation::from(Location::caller()),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::UnsupportedVersion`] - `version` is 0 or newer than this build
    /// * [`ConfigError::Invalid`] - A field could never work, named in the error
    #[track_caller]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: self.version,
                supported: CONFIG_VERSION,
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if self.server.binary.as_os_str().is_empty() {
            return Err(invalid("server.binary", "cannot be empty"));
        }
        if self.server.config_path.as_os_str().is_empty() {
            return Err(invalid("server.config_path", "cannot be empty"));
        }
        if self.server.errlog_path.as_os_str().is_empty() {
            return Err(invalid("server.errlog_path", "cannot be empty"));
        }

        if self.server.launch_probe_secs == 0 || self.server.launch_probe_secs > MAX_LAUNCH_PROBE_SECS
        {
            return Err(invalid(
                "server.launch_probe_secs",
                format!(
                    "{}s is out of range (must be 1-{MAX_LAUNCH_PROBE_SECS})",
                    self.server.launch_probe_secs
                ),
            ));
        }

        if self.supervisor.restart_backoff_max_secs == 0 {
            return Err(invalid("supervisor.restart_backoff_max_secs", "must be at least 1"));
        }

        Ok(())
    }
}

#[track_caller]
fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
        location: ErrorLocation::from(Location::caller()),
    }
}
