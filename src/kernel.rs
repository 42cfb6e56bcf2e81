//! Thin contract over the kernel's filesystem-notification facility.
//!
//! Everything outside this module is ignorant of the inotify wire format;
//! it only ever sees [`EventRecord`] and [`nix::sys::inotify::WatchDescriptor`].
//! Grounded on `nix::sys::inotify`, not the `notify` crate the teacher used
//! for its cross-platform, coalescing watcher — that abstraction hides the
//! raw per-event watch descriptors, cookies, and unmount/overflow/ignored
//! flags this engine needs. See DESIGN.md.

use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;

use nix::errno::Errno;
use nix::sys::inotify::{AddWatchFlags, InitFlags, Inotify, WatchDescriptor};

/// One event as delivered by the kernel: which watch it's for, the raw
/// bitmap of what happened, an opaque rename-correlation cookie, and the
/// (already NUL-stripped) trailing name, if any.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub watch_id: WatchDescriptor,
    pub mask: u32,
    pub cookie: u32,
    pub name: Vec<u8>,
}

/// Special flags the worker reports on but otherwise treats as
/// informational (§4.6 step 4 / §6).
pub const IN_UNMOUNT: u32 = 0x0000_2000;
pub const IN_Q_OVERFLOW: u32 = 0x0000_4000;
pub const IN_IGNORED: u32 = 0x0000_8000;

/// A single notification instance, owned for the lifetime of the
/// supervisor. Dropping it closes the underlying descriptor.
pub struct NotificationInstance {
    inner: Inotify,
}

#[derive(Debug)]
pub enum ReadOutcome {
    Events(Vec<EventRecord>),
    Interrupted,
}

impl NotificationInstance {
    /// Initialize a new notification instance (`inotify_init` equivalent).
    pub fn open() -> nix::Result<Self> {
        let inner = Inotify::init(InitFlags::empty())?;
        Ok(Self { inner })
    }

    /// Register a watch. Returns the kernel-issued opaque descriptor, used
    /// thereafter only for equality against [`EventRecord::watch_id`].
    pub fn install(&self, path: &Path, mask: u32) -> nix::Result<WatchDescriptor> {
        let flags = AddWatchFlags::from_bits_retain(mask);
        self.inner.add_watch(path, flags)
    }

    /// Block until one or more event records are available, or the read is
    /// interrupted by a signal (reported as `ReadOutcome::Interrupted`
    /// rather than an error, per §4.3).
    pub fn read(&self) -> nix::Result<ReadOutcome> {
        match self.inner.read_events() {
            Ok(events) => Ok(ReadOutcome::Events(
                events
                    .into_iter()
                    .map(|e| EventRecord {
                        watch_id: e.wd,
                        mask: e.mask.bits(),
                        cookie: e.cookie,
                        name: e
                            .name
                            .map(|n| {
                                use std::os::unix::ffi::OsStrExt;
                                n.as_bytes().to_vec()
                            })
                            .unwrap_or_default(),
                    })
                    .collect(),
            )),
            Err(Errno::EINTR) => Ok(ReadOutcome::Interrupted),
            Err(e) => Err(e),
        }
    }

    // `close` has no explicit method: `Inotify`'s `Drop` impl closes the
    // owned file descriptor, matching the spec's RAII-friendly redesign
    // of the original's explicit `close(instanceHandle)` call.
}

impl AsRawFd for NotificationInstance {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{WatchDescription, WatchRegistry};
    use std::fs;

    #[test]
    fn install_and_lookup_round_trips_through_registry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let instance = NotificationInstance::open().expect("inotify_init");

        let mut registry = WatchRegistry::new();
        let wd = instance
            .install(dir.path(), 0x0000_0100 /* IN_CREATE */)
            .expect("add_watch");

        registry.insert(
            wd,
            WatchDescription {
                path: dir.path().to_path_buf(),
                event_mask: 0x0000_0100,
                command: "/bin/true".into(),
                user: "nobody".into(),
                mail_recipient: "root@localhost".into(),
                watch_id: 1,
            },
        );

        fs::File::create(dir.path().join("new")).expect("touch file");

        let outcome = instance.read().expect("read");
        let events = match outcome {
            ReadOutcome::Events(events) => events,
            ReadOutcome::Interrupted => panic!("unexpected EINTR"),
        };

        assert_eq!(events.len(), 1);
        let entry = registry.lookup(events[0].watch_id).expect("known watch");
        assert_eq!(entry.path, dir.path());
        assert_eq!(entry.command, "/bin/true");
        assert_eq!(entry.user, "nobody");
        assert_eq!(entry.mail_recipient, "root@localhost");
    }
}
