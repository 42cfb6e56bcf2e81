//! Signal handling.
//!
//! The original trapped SIGHUP/SIGINT/SIGTERM into a single
//! `sig_atomic_t signalCaught` and let the blocking `read()` on the
//! notification fd return `EINTR` to wake the main loop. The teacher's
//! sigwait-on-a-dedicated-thread model doesn't fit here: this process
//! forks, and a thread blocked in `sigwait` does not survive `fork()`
//! cleanly for the child's purposes, so we keep the original's
//! async-signal-safe-handler approach instead, just typed.
//!
//! A single `AtomicI32` ("the station") records the last-caught signal.
//! Handlers only ever do one async-signal-safe thing: store a number.
//! Everything else happens later, on the main thread, via [`consume`].

use std::sync::atomic::{AtomicI32, Ordering};

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

static STATION: AtomicI32 = AtomicI32::new(0);

/// What the supervisor should do in response to the last-caught signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// SIGHUP: if logging to a file, close and reopen the log stream;
    /// otherwise ignored.
    HangUp,
    /// SIGINT or SIGTERM: shut down cleanly.
    Shutdown,
    /// SIGCHLD: reap a finished worker; no action needed beyond that,
    /// since `waitpid` is called explicitly wherever a child is awaited.
    ChildExited,
}

extern "C" fn record(signum: libc_signum) {
    STATION.store(signum, Ordering::SeqCst);
}

// `nix::sys::signal::SigHandler::Handler` wants `extern "C" fn(i32)`;
// alias kept local so the signature above reads clearly.
type libc_signum = i32;

/// Install handlers for the four signals the daemon cares about.
///
/// SIGCHLD is installed with `SA_NOCLDWAIT` semantics emulated by explicit
/// `waitpid` elsewhere (the original relied on `SA_NOCLDWAIT` to avoid
/// zombies outright; we instead reap explicitly in the supervisor so exit
/// status is observable, and disable the kernel's own auto-reap).
pub fn install() -> nix::Result<()> {
    // No SA_RESTART: the blocking read() on the notification fd must
    // return EINTR for these three, or the loop never wakes for them
    // absent a coincident filesystem event.
    let action = SigAction::new(
        SigHandler::Handler(record),
        SaFlags::empty(),
        SigSet::empty(),
    );

    // SIGCHLD gets its own action with SA_NOCLDWAIT: the kernel reaps
    // worker processes on our behalf, so the supervisor never blocks in
    // `waitpid` for them (it only ever waits on a grandchild it forked
    // itself, inside `worker::run`).
    let child_action = SigAction::new(
        SigHandler::Handler(record),
        SaFlags::SA_NOCLDWAIT,
        SigSet::empty(),
    );

    unsafe {
        sigaction(Signal::SIGHUP, &action)?;
        sigaction(Signal::SIGINT, &action)?;
        sigaction(Signal::SIGTERM, &action)?;
        sigaction(Signal::SIGCHLD, &child_action)?;
    }
    Ok(())
}

/// Reset all four handlers to default. Called in the worker immediately
/// after `fork()`, before the grandchild forks and execs, so the executed
/// command inherits ordinary signal disposition rather than the
/// supervisor's handlers (§4.6 step 1).
pub fn release_inherited() -> nix::Result<()> {
    let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    unsafe {
        sigaction(Signal::SIGHUP, &default)?;
        sigaction(Signal::SIGINT, &default)?;
        sigaction(Signal::SIGTERM, &default)?;
        sigaction(Signal::SIGCHLD, &default)?;
    }
    STATION.store(0, Ordering::SeqCst);
    Ok(())
}

/// Read and clear the station, translating the caught signal number (if
/// any) into a [`ControlEvent`]. Returns `None` if nothing has been caught
/// since the last call.
pub fn consume() -> Option<ControlEvent> {
    let caught = STATION.swap(0, Ordering::SeqCst);
    if caught == 0 {
        return None;
    }
    let signal = Signal::try_from(caught).ok()?;
    match signal {
        Signal::SIGHUP => Some(ControlEvent::HangUp),
        Signal::SIGINT | Signal::SIGTERM => Some(ControlEvent::Shutdown),
        Signal::SIGCHLD => Some(ControlEvent::ChildExited),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consume_is_empty_with_nothing_caught() {
        STATION.store(0, Ordering::SeqCst);
        assert_eq!(consume(), None);
    }

    #[test]
    fn consume_drains_the_station() {
        STATION.store(Signal::SIGHUP as i32, Ordering::SeqCst);
        assert_eq!(consume(), Some(ControlEvent::HangUp));
        assert_eq!(consume(), None);
    }

    #[test]
    fn sigint_and_sigterm_both_request_shutdown() {
        STATION.store(Signal::SIGINT as i32, Ordering::SeqCst);
        assert_eq!(consume(), Some(ControlEvent::Shutdown));
        STATION.store(Signal::SIGTERM as i32, Ordering::SeqCst);
        assert_eq!(consume(), Some(ControlEvent::Shutdown));
    }
}
