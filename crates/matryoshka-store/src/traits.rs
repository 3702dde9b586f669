use crate::error::StoreResult;

/// A flat, randomly addressable byte space backing one container.
///
/// All implementations must satisfy these invariants:
/// - `read_at` fills the whole buffer or fails; it never returns partial data.
/// - `write_at` past the current end extends the storage.
/// - `sync` returns only once prior writes are durable as far as the backend
///   can promise.
/// - `replace_with` swaps the entire content in one step; observers see
///   either the old or the new content, never a mix.
pub trait Storage: Send + Sync {
    /// Current length in bytes.
    fn len(&self) -> StoreResult<u64>;

    /// Returns `true` if the storage holds no bytes.
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Fill `buf` with the bytes starting at `offset`.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> StoreResult<()>;

    /// Write `data` at `offset`, extending the storage if needed.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> StoreResult<()>;

    /// Truncate or extend to exactly `len` bytes.
    fn set_len(&mut self, len: u64) -> StoreResult<()>;

    /// Flush pending writes to durable storage.
    fn sync(&mut self) -> StoreResult<()>;

    /// Human-readable location, used in logs and diagnostics.
    fn describe(&self) -> String;

    /// Create an empty storage of the same kind, to build a replacement image in.
    fn scratch(&self) -> StoreResult<Self>
    where
        Self: Sized;

    /// Atomically replace this storage's content with `other`'s.
    fn replace_with(&mut self, other: Self) -> StoreResult<()>
    where
        Self: Sized;
}
