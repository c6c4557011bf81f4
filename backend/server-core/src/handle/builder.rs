use crate::error::handle::HandleError;
use crate::handle::ServerHandle;
use crate::native::{LaunchRequest, NativeServer};
use crate::registry::InstanceRegistry;
use crate::signal::SignalSink;

use common::ErrorLocation;

use std::panic::Location;
use std::path::PathBuf;
use std::sync::Arc;

/// Builder for validated [`ServerHandle`] instances.
///
/// The registry defaults to [`InstanceRegistry::global`]; inject a private one
/// to isolate tests or to run independent groups of servers.
#[derive(Default)]
pub struct ServerHandleBuilder {
    id: Option<u64>,
    config_path: Option<PathBuf>,
    errlog_path: Option<PathBuf>,
    sink: Option<SignalSink>,
    native: Option<Arc<dyn NativeServer>>,
    registry: Option<Arc<InstanceRegistry>>,
}

impl ServerHandleBuilder {
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_errlog_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.errlog_path = Some(path.into());
        self
    }

    pub fn with_signal_sink(mut self, sink: SignalSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_native(mut self, native: Arc<dyn NativeServer>) -> Self {
        self.native = Some(native);
        self
    }

    pub fn with_registry(mut self, registry: Arc<InstanceRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Build the handle with validation.
    #[track_caller]
    pub fn build(self) -> Result<ServerHandle, HandleError> {
        let id = self.id.ok_or_else(|| HandleError::Validation {
            message: String::from("Server id is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let config_path = self.config_path.ok_or_else(|| HandleError::Validation {
            message: String::from("Config path is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if config_path.as_os_str().is_empty() {
            return Err(HandleError::Validation {
                message: String::from("Config path cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let errlog_path = self.errlog_path.ok_or_else(|| HandleError::Validation {
            message: String::from("Error log path is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if errlog_path.as_os_str().is_empty() {
            return Err(HandleError::Validation {
                message: String::from("Error log path cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let sink = self.sink.ok_or_else(|| HandleError::Validation {
            message: String::from("Signal sink is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let native = self.native.ok_or_else(|| HandleError::Validation {
            message: String::from("Native server is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let registry = self.registry.unwrap_or_else(InstanceRegistry::global);

        Ok(ServerHandle::new(
            id,
            LaunchRequest::new(config_path, errlog_path),
            sink,
            native,
            registry,
        ))
    }
}
