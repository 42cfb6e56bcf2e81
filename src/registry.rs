//! The watch registry: the in-memory record of every configured trick and
//! the kernel watch that backs it.
//!
//! Built once at startup and never mutated afterwards — entries are handed
//! out by reference for the lifetime of the process and are never freed
//! before exit (see DESIGN.md, "registry memory").

use std::collections::HashMap;
use std::path::PathBuf;

use nix::sys::inotify::WatchDescriptor;

/// One administrator-requested watch: a path, the events to trigger on, the
/// command to run, the account to run it as, and where to mail any output.
#[derive(Debug, Clone)]
pub struct WatchDescription {
    pub path: PathBuf,
    pub event_mask: u32,
    pub command: String,
    pub user: String,
    pub mail_recipient: String,
    /// Sequence number assigned by the registry in installation order
    /// (1-based). Used for logging and the `X-gidget-watch` mail header;
    /// not the kernel's own descriptor, which `nix`'s typed
    /// [`WatchDescriptor`] deliberately keeps opaque. See DESIGN.md.
    pub watch_id: u32,
}

/// Maps the kernel's opaque watch descriptors back to the watch description
/// that caused them to be installed. Lookup is O(1) regardless of whether
/// the kernel happens to hand out dense, 1-based identifiers.
#[derive(Default)]
pub struct WatchRegistry {
    entries: HashMap<WatchDescriptor, WatchDescription>,
    order: Vec<WatchDescriptor>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a watch that has already been installed with the kernel
    /// adapter. `watch_id` is the registry's own 1-based sequence number,
    /// assigned by the caller (the config loader) as watches are accepted.
    pub fn insert(&mut self, wd: WatchDescriptor, description: WatchDescription) {
        self.order.push(wd);
        self.entries.insert(wd, description);
    }

    pub fn lookup(&self, wd: WatchDescriptor) -> Option<&WatchDescription> {
        self.entries.get(&wd)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if every installed watch was assigned a registry sequence
    /// number matching its installation order with no gaps — i.e. the
    /// dense, 1-based assumption from the original implementation holds.
    /// Diagnostic only; nothing in the engine depends on this being true.
    pub fn is_densely_sequential(&self) -> bool {
        self.order
            .iter()
            .enumerate()
            .all(|(i, wd)| self.entries.get(wd).map(|e| e.watch_id) == Some(i as u32 + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry_reports_empty() {
        let registry = WatchRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.is_densely_sequential());
    }

    // Populating the registry requires a real `WatchDescriptor`, which only
    // the kernel adapter can mint (the type has no public constructor by
    // design). The round-trip property (insert then lookup by the same
    // descriptor yields the same fields) is exercised in `kernel`'s tests,
    // which run against a real inotify instance.
}
