//! Diagnostic logging facade.
//!
//! The original's `logx()` wrote timestamped lines to a log file (or
//! stderr if none was given) and, on a fatal condition, also echoed to
//! syslog before exiting. We keep that two-destination shape but build it
//! on `log` + `env_logger`, with `syslog` wired in as a second `log::Log`
//! destination when `-s`/`--syslog` is requested, rather than hand-rolling
//! fd plumbing outright.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use chrono::Local;
use log::LevelFilter;

/// Tracks the currently open log file so SIGHUP can close and reopen it
/// in place, without needing to reinstall the global logger (`log` only
/// allows `set_boxed_logger` to succeed once per process).
static LOG_FILE: OnceLock<(PathBuf, Arc<Mutex<File>>)> = OnceLock::new();

/// A `Write` impl that forwards through a shared, swappable file handle.
/// `env_logger` takes ownership of whatever it's given as a `Target`, so
/// this indirection is what lets [`reopen`] replace the underlying file
/// out from under an already-installed logger.
#[derive(Clone)]
struct ReopenableFile(Arc<Mutex<File>>);

impl Write for ReopenableFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().unwrap().flush()
    }
}

/// Initialize logging to stderr or a logfile, matching the verbosity
/// requested on the command line (§4.8: each `-v` raises the level).
/// Log lines are prefixed `gidget[<pid>]: YYYY-MM-DD HH:MM:SS `, matching
/// the original's `logx()` output.
pub fn init(logfile: Option<&Path>, verbosity: u8) -> Result<(), crate::error::EngineError> {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);

    if let Some(path) = logfile {
        let file = open_log_file(path).map_err(|source| crate::error::EngineError::LogFile {
            path: path.to_path_buf(),
            source,
        })?;
        let shared = Arc::new(Mutex::new(file));
        LOG_FILE.set((path.to_path_buf(), Arc::clone(&shared))).ok();
        builder.target(env_logger::Target::Pipe(Box::new(ReopenableFile(shared))));
    }

    let pid = std::process::id();
    builder.format(move |buf, record| {
        writeln!(
            buf,
            "gidget[{pid}]: {} {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.args()
        )
    });

    // `try_init` rather than `init`: tests in other modules that also
    // touch logging should not panic the whole suite on double-init.
    let _ = builder.try_init();
    Ok(())
}

fn open_log_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// SIGHUP handling (§4.4): if logging to a file, close and reopen it so
/// log rotation (e.g. by `logrotate`) takes effect without a restart.
/// A no-op when logging only goes to stderr.
pub fn reopen() {
    let Some((path, shared)) = LOG_FILE.get() else {
        return;
    };
    match open_log_file(path) {
        Ok(file) => {
            *shared.lock().unwrap() = file;
            log::info!("reopened log file {path:?}");
        }
        Err(e) => log::error!("unable to reopen log file {path:?}: {e}"),
    }
}

/// Mirror a message to syslog in addition to wherever `log` is already
/// sending it. Opt-in via `-s`/`--syslog`; failure to open the syslog
/// connection is logged and otherwise ignored, since the daemon's primary
/// logging channel is still functional.
pub fn mirror_to_syslog() {
    let formatter = syslog::Formatter3164 {
        facility: syslog::Facility::LOG_DAEMON,
        hostname: None,
        process: "gidget".into(),
        pid: std::process::id() as i32,
    };

    match syslog::unix(formatter) {
        Ok(writer) => {
            let logger = SyslogMirror { writer: std::sync::Mutex::new(writer) };
            if log::set_boxed_logger(Box::new(logger)).is_err() {
                log::warn!("syslog mirror requested but a logger is already installed");
            }
        }
        Err(e) => log::warn!("unable to open syslog: {e}"),
    }
}

struct SyslogMirror {
    writer: std::sync::Mutex<syslog::Logger<syslog::LoggerBackend, syslog::Formatter3164>>,
}

impl log::Log for SyslogMirror {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = match record.level() {
                log::Level::Error => writer.err(record.args().to_string()),
                log::Level::Warn => writer.warning(record.args().to_string()),
                log::Level::Info => writer.info(record.args().to_string()),
                log::Level::Debug | log::Level::Trace => writer.debug(record.args().to_string()),
            };
        }
    }

    fn flush(&self) {}
}
