//! lighttpd run as a child process in foreground mode.
//!
//! `launch` spawns `<binary> -D -f <config>` with stderr appended to the error
//! log and blocks until the child exits. Readiness is detected by polling the
//! OS socket table for a listening TCP socket owned by the child.

use crate::error::native::NativeError;
use crate::native::{LaunchRequest, NativeServer, ShutdownToken};
use crate::registry::LaunchedNotifier;
use crate::{LIGHTTPD_BINARY, NATIVE_SUCCESS_STATUS};

use common::ErrorLocation;

use std::fs::{File, OpenOptions};
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{Receiver, RecvTimeoutError, channel};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{Builder as ThreadBuilder, JoinHandle};
use std::time::Duration;

use backoff::{ExponentialBackoff, backoff::Backoff};
use log::{debug, info, trace, warn};
use netstat2::{AddressFamilyFlags, ProtocolFlags, ProtocolSocketInfo, TcpState, get_sockets_info};
use sysinfo::{Pid, Process, ProcessesToUpdate, Signal, System};

const FOREGROUND_FLAG: &str = "-D";
const CONFIG_FLAG: &str = "-f";
const SIGNAL_EXIT_BASE: i32 = 128;
pub const DEFAULT_LAUNCH_PROBE_MAX_ELAPSED: Duration = Duration::from_secs(10);

/// [`NativeServer`] backed by a lighttpd executable.
///
/// One instance may serve many handles in sequence. `request_shutdown`
/// interrupts the current child; a stop that arrives before the child exists is
/// carried by the launch's [`ShutdownToken`] and honoured right after spawning.
#[derive(Debug)]
pub struct ProcessServer {
    binary: PathBuf,
    launch_probe_max_elapsed: Duration,
    child_pid: Mutex<Option<u32>>,
}

impl Default for ProcessServer {
    fn default() -> Self {
        Self::new(LIGHTTPD_BINARY)
    }
}

impl ProcessServer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            launch_probe_max_elapsed: DEFAULT_LAUNCH_PROBE_MAX_ELAPSED,
            child_pid: Mutex::new(None),
        }
    }

    /// How long to wait for the child to open a listening socket before giving
    /// up on reporting `Launched`.
    pub fn with_launch_probe_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.launch_probe_max_elapsed = max_elapsed;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// PID of the running child, if any.
    pub fn child_pid(&self) -> Option<u32> {
        *self.lock_child_pid()
    }

    fn lock_child_pid(&self) -> MutexGuard<'_, Option<u32>> {
        self.child_pid.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn build_command(&self, request: &LaunchRequest) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(FOREGROUND_FLAG)
            .arg(CONFIG_FLAG)
            .arg(request.config_path())
            .stdin(Stdio::null())
            .stdout(Stdio::null());
        cmd
    }

    #[track_caller]
    fn spawn_child(&self, request: &LaunchRequest) -> Result<std::process::Child, NativeError> {
        if self.binary.as_os_str().is_empty() {
            return Err(NativeError::Spawn {
                message: String::from("Server binary path is empty"),
                location: ErrorLocation::from(Location::caller()),
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "empty binary path",
                )),
            });
        }

        let errlog = open_errlog(request.errlog_path())?;

        debug!(
            "Spawning {} {FOREGROUND_FLAG} {CONFIG_FLAG} {}",
            self.binary.display(),
            request.config_path().display()
        );

        self.build_command(request)
            .stderr(Stdio::from(errlog))
            .spawn()
            .map_err(|e| NativeError::Spawn {
                message: format!("Failed to spawn {}: {e}", self.binary.display()),
                location: ErrorLocation::from(Location::caller()),
                source: Box::new(e),
            })
    }
}

impl NativeServer for ProcessServer {
    fn launch(
        &self,
        request: &LaunchRequest,
        launched: LaunchedNotifier,
        shutdown: &ShutdownToken,
    ) -> Result<i32, NativeError> {
        let mut child = self.spawn_child(request)?;

        let pid = child.id();
        info!("Spawned {} (PID: {pid})", self.binary.display());

        {
            // `request_shutdown` reads the PID under this lock after the token is
            // set, so a stop is seen either there or here.
            let mut child_pid = self.lock_child_pid();
            *child_pid = Some(pid);
            if shutdown.is_requested() {
                debug!("Shutdown requested before PID {pid} was spawned, interrupting");
                send_interrupt(pid);
            }
        }

        let (exited_tx, exited_rx) = channel::<()>();
        let probe = spawn_launch_probe(pid, launched, exited_rx, self.launch_probe_max_elapsed);

        let waited = child.wait();

        drop(exited_tx);
        if let Some(probe) = probe {
            match probe.join() {
                Ok(true) => trace!("Launch of PID {pid} was reported"),
                Ok(false) => debug!("PID {pid} exited without being reported as launched"),
                Err(_) => warn!("Launch probe for PID {pid} panicked"),
            }
        }

        *self.lock_child_pid() = None;

        let status = waited.map_err(|e| NativeError::Wait {
            message: format!("Failed to wait for PID {pid}: {e}"),
            location: ErrorLocation::from(Location::caller()),
            source: e,
        })?;

        let code = exit_status_code(status, shutdown.is_requested());
        info!("Server PID {pid} exited with {status} (status {code})");
        Ok(code)
    }

    fn request_shutdown(&self) {
        let child_pid = self.lock_child_pid();

        match *child_pid {
            Some(pid) => {
                info!("Requesting graceful shutdown of PID {pid}");
                send_interrupt(pid);
            }
            None => debug!("Shutdown requested with no child running"),
        }
    }
}

#[track_caller]
pub(crate) fn open_errlog(path: &Path) -> Result<File, NativeError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| NativeError::ErrorLog {
            path: path.to_path_buf(),
            message: format!("Failed to open error log: {e}"),
            location: ErrorLocation::from(Location::caller()),
            source: e,
        })
}

/// Map a child's exit status onto the native status convention.
///
/// A child killed by a signal after shutdown was requested counts as a
/// graceful stop; any other signal death maps to `128 + signo`.
pub(crate) fn exit_status_code(status: ExitStatus, shutdown_requested: bool) -> i32 {
    match status.code() {
        Some(code) => code,
        None if shutdown_requested => NATIVE_SUCCESS_STATUS,
        None => SIGNAL_EXIT_BASE + terminating_signal(&status).unwrap_or_default(),
    }
}

#[cfg(unix)]
fn terminating_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn terminating_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

fn with_process<F, R>(pid: u32, f: F) -> Option<R>
where
    F: FnOnce(&Process) -> R,
{
    let pid = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

    sys.process(pid).map(f)
}

/// Send SIGINT (lighttpd's graceful shutdown), falling back to a hard kill
/// where the platform has no interrupt signal.
pub(crate) fn send_interrupt(pid: u32) -> bool {
    with_process(pid, |p| {
        if let Some(sent) = p.kill_with(Signal::Interrupt) {
            debug!("Sent SIGINT to PID {pid}: success={sent}");
            sent
        } else {
            let killed = p.kill();
            debug!("Sent SIGKILL to PID {pid}: success={killed}");
            killed
        }
    })
    .unwrap_or_else(|| {
        debug!("Process {pid} not found");
        false
    })
}

#[track_caller]
pub(crate) fn find_listening_port(pid: u32) -> Result<Option<u16>, NativeError> {
    let sockets = get_sockets_info(
        AddressFamilyFlags::IPV4 | AddressFamilyFlags::IPV6,
        ProtocolFlags::TCP,
    )
    .map_err(|e| NativeError::SocketQuery {
        message: format!("Failed to query network sockets: {e}"),
        location: ErrorLocation::from(Location::caller()),
        source: Box::new(e),
    })?;

    for s in sockets {
        if let ProtocolSocketInfo::Tcp(tcp) = s.protocol_socket_info
            && tcp.state == TcpState::Listen
            && s.associated_pids.contains(&pid)
        {
            return Ok(Some(tcp.local_port));
        }
    }

    Ok(None)
}

/// Run [`probe_until_listening`] on its own thread; joining yields whether
/// `launched` fired.
pub(crate) fn spawn_launch_probe(
    pid: u32,
    launched: LaunchedNotifier,
    exited: Receiver<()>,
    max_elapsed: Duration,
) -> Option<JoinHandle<bool>> {
    ThreadBuilder::new()
        .name(format!("lighttpd-probe-{pid}"))
        .spawn(move || probe_until_listening(pid, &launched, &exited, max_elapsed))
        .map_err(|e| warn!("Failed to spawn launch probe for PID {pid}: {e}"))
        .ok()
}

/// Poll until `pid` listens on a TCP port, then fire `launched`.
///
/// Stops early once `exited` disconnects. Returns whether `launched` fired.
pub(crate) fn probe_until_listening(
    pid: u32,
    launched: &LaunchedNotifier,
    exited: &Receiver<()>,
    max_elapsed: Duration,
) -> bool {
    let mut backoff = ExponentialBackoff {
        max_elapsed_time: Some(max_elapsed),
        ..Default::default()
    };

    loop {
        match find_listening_port(pid) {
            Ok(Some(port)) => {
                info!("Server PID {pid} listening on port {port}");
                if let Err(e) = launched.notify() {
                    warn!("Could not report launch of PID {pid}: {e}");
                    return false;
                }
                return true;
            }
            Ok(None) => trace!("PID {pid} not listening yet"),
            Err(e) => debug!("{e}"),
        }

        let Some(delay) = backoff.next_backoff() else {
            warn!("PID {pid} opened no listening socket within {max_elapsed:?}");
            return false;
        };

        match exited.recv_timeout(delay) {
            Err(RecvTimeoutError::Timeout) => continue,
            _ => {
                trace!("PID {pid} exited before listening");
                return false;
            }
        }
    }
}
