mod config;
mod handle;
mod native;
