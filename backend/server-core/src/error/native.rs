use common::ErrorLocation;

use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum NativeError {
    #[error("Spawn Error: {message} {location}")]
    Spawn {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("Error Log Error: {path}: {message} {location}")]
    ErrorLog {
        path: PathBuf,
        message: String,
        location: ErrorLocation,
        #[source]
        source: std::io::Error,
    },

    #[error("Wait Error: {message} {location}")]
    Wait {
        message: String,
        location: ErrorLocation,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid Path Error: {path}: {message} {location}")]
    InvalidPath {
        path: PathBuf,
        message: String,
        location: ErrorLocation,
    },

    #[error("Socket Query Error: {message} {location}")]
    SocketQuery {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("Fault Error: {message} {location}")]
    Fault {
        message: String,
        location: ErrorLocation,
    },
}
