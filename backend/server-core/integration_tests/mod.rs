mod config;
mod error;
mod handle;
mod helpers;
mod native;
mod registry;
mod signal;
