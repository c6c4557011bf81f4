//! In-process binding to the pre-built lighttpd library.
//!
//! The library exposes a blocking entry point and a shutdown primitive, and calls
//! back into [`lighttpd_on_launched`] once it accepts connections. That callback
//! carries no context, so it is dispatched through [`InstanceRegistry::global`]:
//! handles running this backend must use the global registry.

use crate::error::native::NativeError;
use crate::native::{LaunchRequest, NativeServer, ShutdownToken};
use crate::NATIVE_SUCCESS_STATUS;
use crate::registry::{InstanceRegistry, LaunchedNotifier};

use common::ErrorLocation;

use std::ffi::CString;
use std::os::raw::{c_char, c_int};
use std::panic::Location;
use std::path::Path;

use log::{error, info};

#[link(name = "lighttpd")]
unsafe extern "C" {
    fn lighttpd_launch(config_path: *const c_char, errlog_path: *const c_char) -> c_int;
    fn lighttpd_graceful_shutdown();
}

/// Called by the library once the server is ready.
#[unsafe(no_mangle)]
pub extern "C" fn lighttpd_on_launched() {
    if let Err(e) = InstanceRegistry::global().notify_launched() {
        error!("Dropped launched callback: {e}");
    }
}

/// [`NativeServer`] running lighttpd inside this process.
///
/// The library keeps global state; only one launch may be in flight.
#[derive(Debug, Default)]
pub struct EmbeddedServer;

impl EmbeddedServer {
    pub fn new() -> Self {
        Self
    }
}

#[track_caller]
fn to_c_path(path: &Path) -> Result<CString, NativeError> {
    CString::new(path.to_string_lossy().into_owned()).map_err(|e| NativeError::InvalidPath {
        path: path.to_path_buf(),
        message: format!("Path contains an interior NUL byte at {}", e.nul_position()),
        location: ErrorLocation::from(Location::caller()),
    })
}

impl NativeServer for EmbeddedServer {
    fn launch(
        &self,
        request: &LaunchRequest,
        _launched: LaunchedNotifier,
        shutdown: &ShutdownToken,
    ) -> Result<i32, NativeError> {
        let config = to_c_path(request.config_path())?;
        let errlog = to_c_path(request.errlog_path())?;

        if shutdown.is_requested() {
            info!("Shutdown requested before embedded lighttpd started, not launching");
            return Ok(NATIVE_SUCCESS_STATUS);
        }

        info!(
            "Launching embedded lighttpd with {}",
            request.config_path().display()
        );

        // SAFETY: both pointers come from CStrings that outlive the call.
        let status = unsafe { lighttpd_launch(config.as_ptr(), errlog.as_ptr()) };
        Ok(status)
    }

    fn request_shutdown(&self) {
        info!("Requesting embedded lighttpd graceful shutdown");
        // SAFETY: the library only sets a flag checked by its event loop.
        unsafe { lighttpd_graceful_shutdown() }
    }
}
