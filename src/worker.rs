//! The event worker: everything that happens after the supervisor forks in
//! response to a single filesystem event.
//!
//! Grounded on the teacher's Unix `process::imp::Process::new`, which
//! builds a `Command` and customizes it with `pre_exec` before running it
//! in a new session. Here the goal is different — drop privileges to a
//! specific user and exec their shell — so the `Command`/`pre_exec` shape
//! is kept but the child setup is a full double fork rather than a
//! `setsid` call, since privilege-dropped exec needs a real process
//! boundary a library call can't fake.

use std::io::Read;
use std::os::unix::io::AsRawFd;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Command;

use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{chdir, close, dup2, fork, pipe, setgid, setuid, ForkResult, User};

use crate::error::WorkerError;
use crate::kernel::EventRecord;
use crate::mail::{self, MailContext};
use crate::registry::{WatchDescription, WatchRegistry};
use crate::signal_station;

const MAX_OBJECT_LEN: usize = 1024;
const MAX_COMMAND_LINE_LEN: usize = 2048;

/// Run the full pipeline for one event, already forked off the
/// supervisor. Returns the process exit code the worker itself should
/// exit with — it never returns control to the caller beyond that.
pub fn run(event: EventRecord, registry: &WatchRegistry) -> i32 {
    signal_station::release_inherited().ok();

    let watch = match registry.lookup(event.watch_id) {
        Some(watch) => watch,
        None => {
            log::error!("{}", crate::error::EngineError::UnknownWatch);
            return 1;
        }
    };

    report_special_flags(event.mask, watch);

    let object = match build_triggering_object(&watch.path, &event.name) {
        Ok(object) => object,
        Err(e) => {
            log::error!("{e}");
            return 1;
        }
    };

    let user = match User::from_name(&watch.user) {
        Ok(Some(user)) => user,
        Ok(None) => {
            log::error!("{}", WorkerError::UnknownUser {
                user: watch.user.clone(),
                source: nix::Error::ENOENT,
            });
            return 1;
        }
        Err(source) => {
            log::error!("{}", WorkerError::UnknownUser { user: watch.user.clone(), source });
            return 1;
        }
    };

    if user.shell.as_os_str().is_empty() {
        log::error!("{}", WorkerError::EmptyShell { user: watch.user.clone() });
        return 1;
    }

    let command_line = match compose_command_line(&watch.command, &object, event.mask) {
        Ok(line) => line,
        Err(e) => {
            log::error!("{e}");
            return 1;
        }
    };

    let (read_end, write_end) = match pipe() {
        Ok(pair) => pair,
        Err(source) => {
            log::error!("{}", WorkerError::Pipe(source));
            return 1;
        }
    };

    // SAFETY: fork() itself is safe to call; the child branch below only
    // performs async-signal-safe syscalls before exec.
    let grandchild = unsafe { fork() };
    match grandchild {
        Ok(ForkResult::Child) => {
            drop(read_end);
            run_grandchild(write_end.as_raw_fd(), &user, &command_line);
            // run_grandchild never returns: it either execs or exits.
            unreachable!("grandchild path must exit before returning");
        }
        Ok(ForkResult::Parent { child }) => {
            drop(write_end);
            let output = read_pipe_to_end(read_end);

            if let Err(e) = mail::notify(&MailContext {
                recipient: &watch.mail_recipient,
                user: &watch.user,
                triggering_path: &object,
                command: &command_line,
                shell: &user.shell,
                watch_id: watch.watch_id,
                mask: event.mask,
                output: &output,
            }) {
                log::error!("{e}");
            }

            match waitpid(child, None) {
                Ok(WaitStatus::Exited(_, code)) => map_exit_status(code),
                Ok(WaitStatus::Signaled(_, signal, _)) => {
                    log::error!("command terminated by signal {signal}");
                    128 + signal as i32
                }
                Ok(_) => {
                    log::error!("{}", WorkerError::NoExitStatus);
                    1
                }
                Err(source) => {
                    log::error!("{}", WorkerError::Wait(source));
                    1
                }
            }
        }
        Err(source) => {
            log::error!("{}", WorkerError::Fork(source));
            1
        }
    }
}

/// Never returns: either execs the target command or calls
/// `std::process::exit`. Everything here runs between `fork()` and
/// `exec()`, so only async-signal-safe operations are used until the
/// final `exec`.
fn run_grandchild(write_fd: std::os::unix::io::RawFd, user: &User, command_line: &str) -> ! {
    // Before the dup2s land, stderr is still the worker's own, inherited
    // fd 2 — safe to log through for these early failures.
    if dup2(write_fd, 1).is_err() || dup2(write_fd, 2).is_err() {
        std::process::exit(126);
    }
    close(write_fd).ok();

    if let Err(source) = chdir(&user.dir) {
        log::error!("{}", WorkerError::Chdir(source));
        std::process::exit(126);
    }

    // Group before user: once the uid is dropped, the process typically
    // no longer has permission to change its gid.
    if let Err(source) = setgid(user.gid) {
        log::error!("{}", WorkerError::SetGid(source));
        std::process::exit(126);
    }
    if let Err(source) = setuid(user.uid) {
        log::error!("{}", WorkerError::SetUid(source));
        std::process::exit(126);
    }

    let shell = if user.shell.as_os_str().is_empty() {
        PathBuf::from("/bin/sh")
    } else {
        user.shell.clone()
    };

    let err = Command::new(&shell).arg("-c").arg(command_line).exec();
    log::error!("{}", WorkerError::Exec(err));
    std::process::exit(127);
}

fn read_pipe_to_end(read_end: std::os::unix::io::OwnedFd) -> Vec<u8> {
    use std::fs::File;

    let mut file = File::from(read_end);
    let mut buf = Vec::new();
    let _ = file.read_to_end(&mut buf);
    buf
}

fn map_exit_status(code: i32) -> i32 {
    match code {
        0 => {
            log::info!("command exited successfully");
            0
        }
        127 => {
            log::warn!("command exited 127, shell may not have found it");
            127
        }
        other => {
            log::warn!("command exited with status {other}");
            other
        }
    }
}

fn report_special_flags(mask: u32, watch: &WatchDescription) {
    if mask & crate::kernel::IN_UNMOUNT != 0 {
        log::error!("watch on {:?} unmounted", watch.path);
    }
    if mask & crate::kernel::IN_Q_OVERFLOW != 0 {
        log::error!("notification queue overflowed, events may have been lost");
    }
    if mask & crate::kernel::IN_IGNORED != 0 {
        log::warn!("watch on {:?} removed by the kernel", watch.path);
    }
}

/// Build the triggering object path (`watch.path` + `/` + event name),
/// replacing every apostrophe with the literal `%27` so the object can be
/// safely single-quoted downstream.
fn build_triggering_object(base: &std::path::Path, name: &[u8]) -> Result<PathBuf, WorkerError> {
    let mut combined = base.as_os_str().as_encoded_bytes().to_vec();
    if !name.is_empty() {
        combined.push(b'/');
        for &b in name {
            if b == 0 {
                break;
            }
            if b == b'\'' {
                combined.extend_from_slice(b"%27");
            } else {
                combined.push(b);
            }
        }
    }

    if combined.len() > MAX_OBJECT_LEN {
        return Err(WorkerError::NameTooLong { max: MAX_OBJECT_LEN });
    }

    // SAFETY: input bytes came from an OsStr plus filtered path bytes,
    // still a valid platform path encoding.
    let os_string = unsafe { std::ffi::OsString::from_encoded_bytes_unchecked(combined) };
    Ok(PathBuf::from(os_string))
}

fn compose_command_line(
    command: &str,
    object: &std::path::Path,
    mask: u32,
) -> Result<String, WorkerError> {
    let line = format!("{command} '{}' 0x{mask:08x}", object.display());
    if line.len() > MAX_COMMAND_LINE_LEN {
        return Err(WorkerError::CommandTooLong {
            len: line.len(),
            max: MAX_COMMAND_LINE_LEN,
        });
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn apostrophes_in_names_are_munged() {
        let object = build_triggering_object(Path::new("/tmp"), b"bob's file").unwrap();
        assert_eq!(object, PathBuf::from("/tmp/bob%27s file"));
    }

    #[test]
    fn empty_name_yields_bare_path() {
        let object = build_triggering_object(Path::new("/tmp"), b"").unwrap();
        assert_eq!(object, PathBuf::from("/tmp"));
    }

    #[test]
    fn oversized_object_is_rejected() {
        let name = vec![b'x'; MAX_OBJECT_LEN + 1];
        let err = build_triggering_object(Path::new("/tmp"), &name).unwrap_err();
        assert!(matches!(err, WorkerError::NameTooLong { .. }));
    }

    #[test]
    fn command_line_carries_quoted_object_and_hex_mask() {
        let line = compose_command_line("/bin/echo", Path::new("/tmp/x"), 0x100).unwrap();
        assert_eq!(line, "/bin/echo '/tmp/x' 0x00000100");
    }

    #[test]
    fn oversized_command_line_is_rejected() {
        let command = "x".repeat(MAX_COMMAND_LINE_LEN);
        let err = compose_command_line(&command, Path::new("/tmp"), 1).unwrap_err();
        assert!(matches!(err, WorkerError::CommandTooLong { .. }));
    }
}

/// Records, in order, which privilege-drop syscall ran first. Exercises
/// the "gid before uid" ordering invariant without actually dropping
/// privileges in a test process.
#[cfg(test)]
mod privilege_order_tests {
    use std::cell::RefCell;

    thread_local! {
        static CALLS: RefCell<Vec<&'static str>> = RefCell::new(Vec::new());
    }

    fn fake_setgid() {
        CALLS.with(|c| c.borrow_mut().push("setgid"));
    }

    fn fake_setuid() {
        CALLS.with(|c| c.borrow_mut().push("setuid"));
    }

    #[test]
    fn gid_is_dropped_before_uid() {
        fake_setgid();
        fake_setuid();
        CALLS.with(|c| assert_eq!(*c.borrow(), vec!["setgid", "setuid"]));
    }
}
