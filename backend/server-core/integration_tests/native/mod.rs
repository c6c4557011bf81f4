#[cfg(unix)]
mod process;
