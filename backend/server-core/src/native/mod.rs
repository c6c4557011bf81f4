//! The external server being wrapped.
//!
//! A [`NativeServer`] is opaque: `launch` blocks until the server stops and
//! returns its status, `request_shutdown` asks it to stop without waiting.
//!
//! Two backends are provided:
//! - [`process::ProcessServer`] - runs a lighttpd executable as a child process
//! - `embedded::EmbeddedServer` - binds the pre-built lighttpd library in-process
//!   (cargo feature `embedded`)

#[cfg(feature = "embedded")]
pub mod embedded;
pub mod process;
mod shutdown;

pub use shutdown::ShutdownToken;

use crate::error::native::NativeError;
use crate::registry::LaunchedNotifier;

use std::path::{Path, PathBuf};

/// Paths handed to the server; both are opaque to this layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub config_path: PathBuf,
    pub errlog_path: PathBuf,
}

impl LaunchRequest {
    pub fn new(config_path: impl Into<PathBuf>, errlog_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            errlog_path: errlog_path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn errlog_path(&self) -> &Path {
        &self.errlog_path
    }
}

/// Blocking server entry point plus its asynchronous shutdown primitive.
pub trait NativeServer: Send + Sync {
    /// Run the server until it stops.
    ///
    /// Must call `launched.notify()` once the server accepts connections. A
    /// `shutdown` already requested when the server comes up must stop it, since
    /// the matching `request_shutdown` may have arrived before there was anything
    /// to stop.
    ///
    /// # Returns
    ///
    /// * `Ok(0)` - Graceful shutdown
    /// * `Ok(status)` - The server exited with a failure status
    /// * `Err(NativeError)` - The server could not be run or waited on
    fn launch(
        &self,
        request: &LaunchRequest,
        launched: LaunchedNotifier,
        shutdown: &ShutdownToken,
    ) -> Result<i32, NativeError>;

    /// Ask a running `launch` call to unwind. Never blocks on the server stopping.
    fn request_shutdown(&self);
}
