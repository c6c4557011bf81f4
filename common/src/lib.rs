//! Shared building blocks for the lighttpd host workspace.
//!
//! - **common** (this crate): error location tracking used by every error type
//! - **server-core**: managed server handle, instance registry, native backends
//! - **lighttpd-host**: command-line host wiring everything together

pub mod error;

#[cfg(test)]
mod tests;

pub use error::error_location::ErrorLocation;
