use crate::error::HostError;

use server_core::config::{CONFIG_FILE_NAME, HostConfig};

use common::ErrorLocation;

use std::panic::Location;
use std::path::{Path, PathBuf};

use clap::Parser;
use log::info;

/// Everything resolved from flags and the config file before the logger starts.
#[derive(Debug, Clone)]
pub struct HostSettings {
    pub config_dir: PathBuf,
    pub log_dir: PathBuf,
    pub config: HostConfig,
    /// Whether lighttpd-host.json existed; defaults were used otherwise.
    pub config_file_found: bool,
}

impl HostSettings {
    /// Report how the settings were resolved. Call once the logger is up.
    pub fn log_summary(&self) {
        let config_file = self.config_dir.join(CONFIG_FILE_NAME);
        if self.config_file_found {
            info!("Config loaded from {}", config_file.display());
        } else {
            info!(
                "Config file not found at {}, using defaults",
                config_file.display()
            );
        }
        info!("Log directory: {}", self.log_dir.display());
        info!("Server binary: {}", self.config.server.binary.display());
        info!(
            "Server config: {}, errlog: {}",
            self.config.server.config_path.display(),
            self.config.server.errlog_path.display()
        );
    }
}

/// Directory created under the platform config dir.
pub const APP_DIR_NAME: &str = "lighttpd-host";

#[derive(Debug, Parser)]
#[command(name = "lighttpd-host")]
#[command(about = "Run lighttpd as a supervised single-instance server")]
#[command(version)]
pub struct Cli {
    /// Directory holding lighttpd-host.json (default: <platform config dir>/lighttpd-host)
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// Directory for lighttpd-host.log (default: the config directory)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// lighttpd configuration file passed to the server
    #[arg(long)]
    pub server_config: Option<PathBuf>,

    /// File receiving the server's error output
    #[arg(long)]
    pub errlog: Option<PathBuf>,

    /// lighttpd executable
    #[arg(long)]
    pub binary: Option<PathBuf>,

    /// Restarts allowed after a crash before giving up
    #[arg(long)]
    pub max_restarts: Option<u32>,

    /// Pretty-print JSON event lines
    #[arg(long)]
    pub pretty: bool,
}

impl Cli {
    /// Config directory from the flag, or the platform default.
    #[track_caller]
    pub fn config_dir(&self) -> Result<PathBuf, HostError> {
        if let Some(dir) = &self.config_dir {
            return Ok(dir.clone());
        }

        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .ok_or_else(|| HostError::Host {
                message: String::from(
                    "Could not determine the platform config directory, pass --config-dir",
                ),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    /// Log directory from the flag, falling back to `config_dir`.
    pub fn log_dir(&self, config_dir: &Path) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| config_dir.to_path_buf())
    }

    /// Apply command-line overrides on top of the loaded config.
    pub fn apply_overrides(&self, config: &mut HostConfig) {
        if let Some(path) = &self.server_config {
            config.server.config_path = path.clone();
        }
        if let Some(path) = &self.errlog {
            config.server.errlog_path = path.clone();
        }
        if let Some(binary) = &self.binary {
            config.server.binary = binary.clone();
        }
        if let Some(max_restarts) = self.max_restarts {
            config.supervisor.max_restarts = max_restarts;
        }
    }

    /// Load the config file, apply flags on top and validate the result.
    ///
    /// Logs nothing; see [`HostSettings::log_summary`].
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] if the config directory cannot be determined, or
    /// the config file is unreadable, malformed or invalid after overrides.
    pub fn settings(&self) -> Result<HostSettings, HostError> {
        let config_dir = self.config_dir()?;
        let config_file_found = config_dir.join(CONFIG_FILE_NAME).exists();
        let mut config = HostConfig::load(&config_dir)?;
        self.apply_overrides(&mut config);
        config.validate()?;

        Ok(HostSettings {
            log_dir: self.log_dir(&config_dir),
            config_dir,
            config,
            config_file_found,
        })
    }
}
