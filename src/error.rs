//! Error types for the engine.
//!
//! Three taxonomies, matching the propagation rules in the design: a
//! [`ConfigError`] never escapes the loader (bad lines are logged and
//! skipped), an [`EngineError`] is startup- or invariant-fatal and always
//! terminates the daemon, and a [`WorkerError`] is fatal only to the worker
//! process that produced it.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("line {line}: invisible character at position {position}")]
    InvisibleChar { line: usize, position: usize },

    #[error("line {line}: illegal character (apostrophe) at position {position}")]
    IllegalChar { line: usize, position: usize },

    #[error("line {line}: too few fields ({found}, need 5)")]
    TooFewFields { line: usize, found: usize },

    #[error("line {line}: too many fields, discarding excess {excess:?}")]
    TooManyFields { line: usize, excess: Vec<String> },

    #[error("line {line} field 2: non-numeric event mask {value:?}")]
    BadMask { line: usize, value: String },

    #[error("line {line} field 2: event mask must be non-zero")]
    ZeroMask { line: usize },

    #[error("line {line} field 1: pathconf(NAME_MAX) failed for {path:?}: {source}")]
    UnresolvablePath { line: usize, path: PathBuf, source: nix::Error },

    #[error("line {line} field 3: command too long ({len} > {max} bytes)")]
    CommandTooLong { line: usize, len: usize, max: usize },

    #[error("line {line} field 4: user name too long ({len} > {max} bytes)")]
    UserTooLong { line: usize, len: usize, max: usize },

    #[error("line {line} field 5: mail address too long ({len} > {max} bytes)")]
    MailTooLong { line: usize, len: usize, max: usize },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("error opening config file {path:?}: {source}")]
    ConfigOpen { path: PathBuf, source: io::Error },

    #[error("unable to initialize kernel notification instance: {0}")]
    KernelInit(#[source] nix::Error),

    #[error("unable to install signal handler: {0}")]
    SignalInstall(#[source] nix::Error),

    #[error("unable to fork: {0}")]
    Fork(#[source] nix::Error),

    #[error("unable to fork daemon process: {0}")]
    DaemonFork(#[source] nix::Error),

    #[error("could not create pid file {path:?}: {source}")]
    PidFile { path: PathBuf, source: io::Error },

    #[error("could not open log file {path:?}: {source}")]
    LogFile { path: PathBuf, source: io::Error },

    #[error("invariant violation: event referenced unknown watch id")]
    UnknownWatch,

    #[error("i/o error on {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("filesystem object name overflow, max {max} bytes")]
    NameTooLong { max: usize },

    #[error("unable to resolve user {user:?}: {source}")]
    UnknownUser { user: String, source: nix::Error },

    #[error("user {user:?} has no usable login shell")]
    EmptyShell { user: String },

    #[error("command too long for shell ({len} > {max} bytes)")]
    CommandTooLong { len: usize, max: usize },

    #[error("unable to create mail pipe: {0}")]
    Pipe(#[source] nix::Error),

    #[error("unable to fork script executor: {0}")]
    Fork(#[source] nix::Error),

    #[error("unable to chdir to home directory: {0}")]
    Chdir(#[source] nix::Error),

    #[error("unable to set group id: {0}")]
    SetGid(#[source] nix::Error),

    #[error("unable to set user id: {0}")]
    SetUid(#[source] nix::Error),

    #[error("execl of script failed: {0}")]
    Exec(#[source] io::Error),

    #[error("unable to obtain exit status of grandchild: {0}")]
    Wait(#[source] nix::Error),

    #[error("unable to determine exit status of script (not exited normally)")]
    NoExitStatus,

    #[error("mail submission failed: {0}")]
    Mail(#[source] io::Error),
}
