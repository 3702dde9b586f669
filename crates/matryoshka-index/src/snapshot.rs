//! Persisted form of the path index.
//!
//! The container stores the index as one bincode-encoded [`IndexSnapshot`].
//! Integrity of the encoded bytes is checked by the container format; this
//! module only turns bytes into a structurally valid [`PathIndex`] and back.

use matryoshka_types::EntryId;
use serde::{Deserialize, Serialize};

use crate::entry::IndexEntry;
use crate::error::{IndexError, IndexResult};
use crate::index::PathIndex;

/// Serializable image of a [`PathIndex`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    /// The id counter at the time of the snapshot.
    pub next_id: EntryId,
    /// Every entry, in path order.
    pub entries: Vec<IndexEntry>,
}

impl IndexSnapshot {
    /// Capture the current state of an index.
    pub fn capture(index: &PathIndex) -> Self {
        Self {
            next_id: index.next_id(),
            entries: index.iter().cloned().collect(),
        }
    }

    /// Encode to bytes.
    pub fn to_bytes(&self) -> IndexResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| IndexError::Serialization(e.to_string()))
    }

    /// Decode from bytes.
    pub fn from_bytes(data: &[u8]) -> IndexResult<Self> {
        bincode::deserialize(data).map_err(|e| IndexError::Serialization(e.to_string()))
    }

    /// Rebuild the in-memory index.
    pub fn into_index(self) -> IndexResult<PathIndex> {
        PathIndex::from_parts(self.next_id, self.entries)
    }
}

impl PathIndex {
    /// Encode the index into snapshot bytes.
    pub fn to_bytes(&self) -> IndexResult<Vec<u8>> {
        IndexSnapshot::capture(self).to_bytes()
    }

    /// Decode an index from snapshot bytes.
    pub fn from_bytes(data: &[u8]) -> IndexResult<Self> {
        let snapshot = IndexSnapshot::from_bytes(data)?;
        tracing::debug!(
            entries = snapshot.entries.len(),
            next_id = snapshot.next_id.get(),
            "decoded index snapshot"
        );
        snapshot.into_index()
    }
}
