//! Path index for the Matryoshka container.
//!
//! Maps normalized inner paths to entry metadata: size and the ordered list
//! of chunk references that reproduce the entry's bytes. The index lives in
//! memory while a container is open and is persisted as a single snapshot
//! region inside the container file on every commit.
//!
//! # Key Types
//!
//! - [`PathIndex`] -- The in-memory index (BTreeMap-backed, deterministic order)
//! - [`IndexEntry`] -- Metadata of one stored entry
//! - [`ChunkRef`] -- Extent of one chunk inside the container file
//! - [`Find`] -- Lazy prefix enumeration over the index

pub mod entry;
pub mod error;
pub mod index;
pub mod snapshot;

pub use entry::{ChunkRef, IndexEntry};
pub use error::{IndexError, IndexResult};
pub use index::{Find, PathIndex};
pub use snapshot::IndexSnapshot;
