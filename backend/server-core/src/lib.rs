pub mod config;
pub mod error;
pub mod handle;
pub mod native;
pub mod registry;
pub mod signal;

#[cfg(test)]
mod tests;

pub use handle::{HandleState, ServerHandle, ServerHandleBuilder};
pub use native::{LaunchRequest, NativeServer, ShutdownToken};
pub use registry::{InstanceRegistry, LaunchedNotifier};
pub use signal::{ServerEvent, ServerSignal, SignalReceiver, SignalSink, signal_channel};

/// Status the native launch call returns after a graceful shutdown.
pub const NATIVE_SUCCESS_STATUS: i32 = 0;

/// Crash message emitted when a handle is started while another one holds the registry.
pub const ANOTHER_INSTANCE_ACTIVE_MESSAGE: &str = "Another instance is active";

/// Default lighttpd executable looked up on `PATH`.
pub const LIGHTTPD_BINARY: &str = "lighttpd";
