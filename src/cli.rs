//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_CONFIG_FILE: &str = "/etc/gidget.conf";
pub const DEFAULT_LOG_FILE: &str = "/var/log/gidget";
pub const DEFAULT_PID_FILE: &str = "/var/run/gidget.pid";

/// Runs commands under a target user account when filesystem events occur,
/// and mails any output.
#[derive(Parser, Debug)]
#[command(name = "gidget", version, about)]
pub struct Args {
    /// Path to the config file.
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Daemonize after startup.
    #[arg(short = 'd', long = "daemon")]
    pub daemon: bool,

    /// Path to the log file. Implied by --daemon if not given.
    #[arg(short = 'l', long = "logfile")]
    pub logfile: Option<PathBuf>,

    /// Path to the pid file, written only when daemonized.
    #[arg(short = 'p', long = "pidfile", default_value = DEFAULT_PID_FILE)]
    pub pidfile: PathBuf,

    /// Mirror diagnostics to syslog, optionally at the given priority (0-7).
    #[arg(short = 's', long = "syslog", value_name = "PRIORITY")]
    pub syslog: Option<Option<u8>>,

    /// Increase logging verbosity. Repeatable.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// The effective log file path: explicit `--logfile`, else the
    /// default path when daemonizing (so daemonized output isn't
    /// silently dropped), else `None` (log to stderr).
    pub fn effective_logfile(&self) -> Option<PathBuf> {
        self.logfile
            .clone()
            .or_else(|| self.daemon.then(|| PathBuf::from(DEFAULT_LOG_FILE)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied_without_flags() {
        let args = Args::parse_from(["gidget"]);
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_FILE));
        assert_eq!(args.pidfile, PathBuf::from(DEFAULT_PID_FILE));
        assert!(!args.daemon);
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn verbosity_counts_repeats() {
        let args = Args::parse_from(["gidget", "-vvv"]);
        assert_eq!(args.verbose, 3);
    }

    #[test]
    fn daemon_without_explicit_logfile_falls_back_to_default() {
        let args = Args::parse_from(["gidget", "-d"]);
        assert_eq!(args.effective_logfile(), Some(PathBuf::from(DEFAULT_LOG_FILE)));
    }

    #[test]
    fn explicit_logfile_overrides_daemon_default() {
        let args = Args::parse_from(["gidget", "-d", "-l", "/tmp/custom.log"]);
        assert_eq!(args.effective_logfile(), Some(PathBuf::from("/tmp/custom.log")));
    }
}
