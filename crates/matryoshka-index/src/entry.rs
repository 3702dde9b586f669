//! Index entry types for stored files.

use std::time::SystemTime;

use matryoshka_types::{ChunkSize, EntryId, InnerPath};
use serde::{Deserialize, Serialize};

/// Extent of one chunk inside the container file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRef {
    /// Position of this chunk within its entry, starting at zero.
    pub seq: u32,
    /// Absolute byte offset in the container file.
    pub offset: u64,
    /// Length in bytes.
    pub len: u64,
    /// CRC32 of the chunk bytes.
    pub crc32: u32,
}

impl ChunkRef {
    /// One past the last byte of this chunk in the container file.
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }
}

/// A logical file stored inside a container.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Persistent id, unique within the container.
    pub id: EntryId,
    /// Normalized inner path, unique within the container.
    pub path: InnerPath,
    /// Total size in bytes; always the sum of the chunk lengths.
    pub size: u64,
    /// Chunking requested when the entry was pushed.
    pub chunk_size: ChunkSize,
    /// Chunk references in sequence order.
    pub chunks: Vec<ChunkRef>,
    /// When the entry was pushed.
    pub created: SystemTime,
}

impl IndexEntry {
    /// Create an entry from its chunk list. The size is derived from the chunks.
    pub fn new(
        id: EntryId,
        path: InnerPath,
        chunk_size: ChunkSize,
        chunks: Vec<ChunkRef>,
    ) -> Self {
        let size = chunks.iter().map(|c| c.len).sum();
        Self {
            id,
            path,
            size,
            chunk_size,
            chunks,
            created: SystemTime::now(),
        }
    }

    /// Number of chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Find the chunk holding logical byte `offset`.
    ///
    /// Returns the chunk's position in [`IndexEntry::chunks`] and the offset
    /// of `offset` within that chunk, or `None` if `offset >= size`.
    pub fn locate(&self, offset: u64) -> Option<(usize, u64)> {
        let mut start = 0u64;
        for (idx, chunk) in self.chunks.iter().enumerate() {
            if offset < start + chunk.len {
                return Some((idx, offset - start));
            }
            start += chunk.len;
        }
        None
    }
}
