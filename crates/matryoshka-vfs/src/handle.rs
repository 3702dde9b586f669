use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use matryoshka_types::EntryId;

/// Identity of one loaded container within this process.
///
/// Every load gets a fresh id, including reloads of the same file, so a
/// handle can never be resolved against a container it did not come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContainerId(u64);

impl ContainerId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Reference to an entry of a specific loaded container.
///
/// Handles are plain values. They hold no borrow of the container; instead
/// each use is checked against the container's id and live index, so a
/// handle outliving its container or its entry is rejected rather than
/// resolved to something else.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntryHandle {
    container: ContainerId,
    entry: EntryId,
}

impl EntryHandle {
    pub(crate) fn new(container: ContainerId, entry: EntryId) -> Self {
        Self { container, entry }
    }

    pub fn container(&self) -> ContainerId {
        self.container
    }

    pub fn entry(&self) -> EntryId {
        self.entry
    }
}

impl fmt::Display for EntryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.container, self.entry)
    }
}
