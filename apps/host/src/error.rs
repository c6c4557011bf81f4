use common::ErrorLocation;

use server_core::error::config::ConfigError;
use server_core::error::handle::HandleError;

use thiserror::Error;

/// Errors that stop the host before or while supervising the server.
///
/// Server crashes are not errors here; they arrive as signals and decide the
/// exit code.
#[derive(Debug, Error)]
pub enum HostError {
    /// Error from this App
    #[error("Host Error: {message} {location}")]
    Host {
        message: String,
        location: ErrorLocation,
    },

    /// Logger could not be set up
    #[error("Logger Error: {message} {location}")]
    Logger {
        message: String,
        location: ErrorLocation,
    },

    /// Event line could not be written
    #[error("Output Error: {message} {location}")]
    Output {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Handle(#[from] HandleError),
}
