//! The event loop: the supervisor's entire lifetime after setup is this
//! loop. Grounded on the teacher's `run::watch` shape — block on a single
//! event source, dispatch, repeat — generalized from file-change
//! notifications driving a user command to kernel notifications driving a
//! forked, privilege-dropped worker.

use std::os::unix::io::AsRawFd;

use nix::unistd::{close, fork, ForkResult};

use crate::kernel::{NotificationInstance, ReadOutcome};
use crate::logger;
use crate::registry::WatchRegistry;
use crate::signal_station::{self, ControlEvent};
use crate::worker;

/// Runs until a shutdown signal is received or the notification read
/// reports a condition this process can't recover from, then calls
/// `std::process::exit`.
pub fn run(kernel: NotificationInstance, registry: WatchRegistry) -> ! {
    log::info!("watching {} configured paths", registry.len());

    loop {
        match kernel.read() {
            Ok(ReadOutcome::Events(events)) => {
                for event in events {
                    dispatch(&kernel, &registry, event);
                }
            }
            Ok(ReadOutcome::Interrupted) => match signal_station::consume() {
                Some(ControlEvent::HangUp) => {
                    logger::reopen();
                }
                Some(ControlEvent::Shutdown) => {
                    log::info!("shutting down");
                    std::process::exit(0);
                }
                Some(ControlEvent::ChildExited) => {
                    // Nothing to do: SA_NOCLDWAIT means the kernel already
                    // reaped the worker, it never becomes a zombie.
                }
                None => {
                    // Spurious EINTR with nothing recorded; keep looping.
                }
            },
            Err(e) => {
                log::error!("kernel notification read failed: {e}, daemon dead");
                std::process::exit(1);
            }
        }
    }
}

fn dispatch(kernel: &NotificationInstance, registry: &WatchRegistry, event: crate::kernel::EventRecord) {
    // SAFETY: the only code run in the child before the worker takes over
    // is `worker::run`, which itself only performs async-signal-safe
    // operations before its own grandchild exec.
    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            // Close this process's copy of the notification fd; the
            // worker has no business reading further events, and the
            // supervisor's own fd (a separate table entry after fork) is
            // untouched by this.
            close(kernel.as_raw_fd()).ok();
            let status = worker::run(event, registry);
            std::process::exit(status);
        }
        Ok(ForkResult::Parent { .. }) => {
            // SIGCHLD auto-reaps via the installed handler's disposition;
            // the supervisor never blocks waiting on a worker.
        }
        Err(e) => {
            log::error!("unable to fork worker: {e}");
        }
    }
}
