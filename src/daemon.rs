//! Best-effort daemonization.
//!
//! Not a hardened double-fork/session-leader protocol — the spec treats
//! `-d` as a thin convenience, not a core concern. Fork once, detach from
//! the controlling terminal, redirect the standard streams to
//! `/dev/null`, and record the pid.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use nix::unistd::{dup2, fork, setsid, ForkResult};

use crate::error::EngineError;

/// Forks, lets the parent exit immediately, and has the (now-orphaned)
/// child start a new session and close its inherited terminal. Returns in
/// the child only; the parent process calls `std::process::exit(0)`
/// directly from here and never returns.
pub fn daemonize() -> Result<(), EngineError> {
    match unsafe { fork() }.map_err(EngineError::DaemonFork)? {
        ForkResult::Parent { .. } => std::process::exit(0),
        ForkResult::Child => {}
    }

    setsid().map_err(EngineError::DaemonFork)?;

    let devnull = OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/null")
        .map_err(|source| EngineError::Io { path: "/dev/null".into(), source })?;

    let fd = devnull.as_raw_fd();
    dup2(fd, 0).map_err(EngineError::DaemonFork)?;
    dup2(fd, 1).map_err(EngineError::DaemonFork)?;
    dup2(fd, 2).map_err(EngineError::DaemonFork)?;

    Ok(())
}

/// Write the running process's pid to `path`, truncating any previous
/// contents. Not removed on exit — matches the original's lack of a
/// cleanup handler for the pidfile.
pub fn write_pidfile(path: &Path) -> Result<(), EngineError> {
    let mut file: File = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|source| EngineError::PidFile { path: path.to_path_buf(), source })?;

    writeln!(file, "{}", std::process::id())
        .map_err(|source| EngineError::PidFile { path: path.to_path_buf(), source })?;
    Ok(())
}
