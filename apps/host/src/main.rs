//! lighttpd-host - run lighttpd as a supervised single-instance server.
//!
//! Lifecycle events are printed to stdout as JSON lines; logs go to stderr and
//! `lighttpd-host.log`.
//!
//! # Examples
//!
//! ```bash
//! lighttpd-host --server-config /etc/lighttpd/lighttpd.conf --errlog /tmp/lighttpd.err
//! lighttpd-host --binary /usr/sbin/lighttpd --max-restarts 3 --pretty
//! ```

use lighttpd_host::cli::Cli;
use lighttpd_host::error::HostError;
use lighttpd_host::logger::initialize as LoggerInitialize;
use lighttpd_host::supervisor::{Supervisor, SupervisorOptions, SupervisorOutcome};

use server_core::LaunchRequest;
use server_core::native::process::ProcessServer;

use common::ErrorLocation;

use std::fs::create_dir_all;
use std::io::stdout;
use std::panic::Location;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(outcome) => {
            info!("lighttpd-host exiting: {outcome:?}");
            outcome.exit_code()
        }
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<SupervisorOutcome, HostError> {
    let settings = cli.settings()?;

    create_dir_all(&settings.log_dir).map_err(|e| HostError::Host {
        message: format!(
            "Failed to create log directory {}: {e}",
            settings.log_dir.display()
        ),
        location: ErrorLocation::from(Location::caller()),
    })?;

    // Initialize logger FIRST
    LoggerInitialize(&settings.log_dir, *settings.config.logging.level)?;

    info!("lighttpd-host starting");
    settings.log_summary();

    let config = &settings.config;
    let native = Arc::new(
        ProcessServer::new(&config.server.binary).with_launch_probe_max_elapsed(
            Duration::from_secs(config.server.launch_probe_secs),
        ),
    );
    let request = LaunchRequest::new(&config.server.config_path, &config.server.errlog_path);
    let options = SupervisorOptions::from_config(config, cli.pretty);

    let mut supervisor = Supervisor::new(native, request, options, stdout());
    supervisor.run(shutdown_signal()).await
}

/// Resolves on Ctrl-C. If the handler cannot be installed, never resolves.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}
