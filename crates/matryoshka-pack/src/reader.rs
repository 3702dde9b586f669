use std::io;

use matryoshka_index::{ChunkRef, IndexEntry};
use matryoshka_store::Storage;

use crate::error::{PackError, PackResult};

/// Reads an entry's bytes by walking its chunk list in sequence order.
///
/// Every chunk that is read from its first to its last byte is checked
/// against its recorded CRC32. Chunks only partially covered by a ranged
/// read are not checked.
pub struct EntryReader<'a, S: Storage> {
    storage: &'a S,
    chunks: &'a [ChunkRef],
    chunk_idx: usize,
    within: u64,
    remaining: u64,
    hasher: Option<crc32fast::Hasher>,
}

impl<'a, S: Storage> EntryReader<'a, S> {
    /// Reader over the whole entry.
    pub fn new(storage: &'a S, entry: &'a IndexEntry) -> Self {
        Self {
            storage,
            chunks: &entry.chunks,
            chunk_idx: 0,
            within: 0,
            remaining: entry.size,
            hasher: Some(crc32fast::Hasher::new()),
        }
    }

    /// Reader over `len` bytes of the entry starting at logical `offset`.
    pub fn range(storage: &'a S, entry: &'a IndexEntry, offset: u64, len: u64) -> PackResult<Self> {
        let in_bounds = offset
            .checked_add(len)
            .is_some_and(|end| end <= entry.size);
        if !in_bounds {
            return Err(PackError::OutOfBounds {
                offset,
                len,
                size: entry.size,
            });
        }

        let mut reader = Self::new(storage, entry);
        reader.remaining = len;
        if len > 0 {
            if let Some((chunk_idx, within)) = entry.locate(offset) {
                reader.chunk_idx = chunk_idx;
                reader.within = within;
                if within > 0 {
                    reader.hasher = None;
                }
            }
        }
        Ok(reader)
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Read the next block into `buf`, returning the number of bytes read.
    ///
    /// Returns `Ok(0)` once the entry (or range) is exhausted.
    pub fn read_block(&mut self, buf: &mut [u8]) -> PackResult<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        // Step over chunks with nothing left to give.
        while self.within >= self.current()?.len {
            self.finish_chunk()?;
        }

        let chunk = *self.current()?;
        let n = (chunk.len - self.within)
            .min(self.remaining)
            .min(buf.len() as u64) as usize;
        let block = &mut buf[..n];
        self.storage.read_at(chunk.offset + self.within, block)?;
        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(block);
        }
        self.within += n as u64;
        self.remaining -= n as u64;

        if self.within == chunk.len {
            self.finish_chunk()?;
        }
        Ok(n)
    }

    /// Read everything that is left into memory.
    pub fn read_to_vec(mut self) -> PackResult<Vec<u8>> {
        let mut out = vec![0u8; self.remaining as usize];
        let mut filled = 0;
        while filled < out.len() {
            filled += self.read_block(&mut out[filled..])?;
        }
        Ok(out)
    }

    fn current(&self) -> PackResult<&'a ChunkRef> {
        let chunks: &'a [ChunkRef] = self.chunks;
        chunks.get(self.chunk_idx).ok_or(PackError::OutOfBounds {
            offset: self.within,
            len: self.remaining,
            size: 0,
        })
    }

    fn finish_chunk(&mut self) -> PackResult<()> {
        let chunk = *self.current()?;
        if let Some(hasher) = self.hasher.take() {
            if hasher.finalize() != chunk.crc32 {
                return Err(PackError::ChunkCrcMismatch {
                    seq: chunk.seq,
                    offset: chunk.offset,
                });
            }
        }
        self.chunk_idx += 1;
        self.within = 0;
        self.hasher = Some(crc32fast::Hasher::new());
        Ok(())
    }
}

impl<S: Storage> io::Read for EntryReader<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_block(buf).map_err(io::Error::other)
    }
}
