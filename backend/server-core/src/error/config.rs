use common::ErrorLocation;

use std::io::Error as IoError;
use std::path::PathBuf;

use serde_json::Error as JsonError;
use thiserror::Error as ThisError;

/// Failures loading, saving or checking `lighttpd-host.json`.
#[derive(Debug, ThisError)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("Config Read Error: cannot read {path}: {source} {location}")]
    Read {
        path: PathBuf,
        location: ErrorLocation,
        #[source]
        source: IoError,
    },

    /// The file is not valid JSON, or does not match the host config layout.
    #[error("Config Parse Error: {path} is not a valid host config: {source} {location}")]
    Parse {
        path: PathBuf,
        location: ErrorLocation,
        #[source]
        source: JsonError,
    },

    /// Creating the directory, writing the temp file, or renaming it failed.
    #[error("Config Write Error: cannot write {path}: {source} {location}")]
    Write {
        path: PathBuf,
        location: ErrorLocation,
        #[source]
        source: IoError,
    },

    #[error("Config Serialize Error: {source} {location}")]
    Serialize {
        location: ErrorLocation,
        #[source]
        source: JsonError,
    },

    /// Written by a newer lighttpd-host, or corrupted.
    #[error("Config Version Error: version {found} is not supported (expected 1-{supported}) {location}")]
    UnsupportedVersion {
        found: u32,
        supported: u32,
        location: ErrorLocation,
    },

    /// A field holds a value the server could never start with.
    #[error("Config Validation Error: {field}: {reason} {location}")]
    Invalid {
        field: &'static str,
        reason: String,
        location: ErrorLocation,
    },
}
