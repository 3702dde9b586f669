use std::sync::{Arc, RwLock};

use crate::error::{StoreError, StoreResult};
use crate::traits::Storage;

/// In-memory storage backed by a shared byte buffer.
///
/// Intended for tests and embedding. Clones share the same buffer, so a
/// clone kept aside observes everything written through the original; this
/// is how tests "reopen" a container after closing it.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    data: Arc<RwLock<Vec<u8>>>,
}

impl MemoryStorage {
    /// Create a new empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer holding `bytes`.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(bytes)),
        }
    }

    /// Copy of the current content.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.read().expect("lock poisoned").clone()
    }

    /// Overwrite a single byte, for corruption tests.
    pub fn poke(&self, offset: usize, value: u8) {
        let mut data = self.data.write().expect("lock poisoned");
        if let Some(byte) = data.get_mut(offset) {
            *byte = value;
        }
    }
}

impl Storage for MemoryStorage {
    fn len(&self) -> StoreResult<u64> {
        Ok(self.data.read().expect("lock poisoned").len() as u64)
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> StoreResult<()> {
        let data = self.data.read().expect("lock poisoned");
        let size = data.len() as u64;
        let len = buf.len() as u64;
        let end = offset.checked_add(len).filter(|end| *end <= size);
        match end {
            Some(end) => {
                buf.copy_from_slice(&data[offset as usize..end as usize]);
                Ok(())
            }
            None => Err(StoreError::OutOfRange { offset, len, size }),
        }
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> StoreResult<()> {
        let mut data = self.data.write().expect("lock poisoned");
        let start = offset as usize;
        let end = start + bytes.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(bytes);
        Ok(())
    }

    fn set_len(&mut self, len: u64) -> StoreResult<()> {
        self.data
            .write()
            .expect("lock poisoned")
            .resize(len as usize, 0);
        Ok(())
    }

    fn sync(&mut self) -> StoreResult<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        "<memory>".into()
    }

    fn scratch(&self) -> StoreResult<Self> {
        Ok(Self::new())
    }

    fn replace_with(&mut self, other: Self) -> StoreResult<()> {
        let content = other.to_bytes();
        *self.data.write().expect("lock poisoned") = content;
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.data.read().expect("lock poisoned").len();
        f.debug_struct("MemoryStorage").field("len", &len).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_storage_is_empty() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.len().unwrap(), 0);
        assert!(storage.is_empty().unwrap());
    }

    #[test]
    fn write_extends_and_reads_back() {
        let mut storage = MemoryStorage::new();
        storage.write_at(4, b"abcd").unwrap();
        assert_eq!(storage.len().unwrap(), 8);

        let mut buf = [0u8; 4];
        storage.read_at(4, &mut buf).unwrap();
        assert_eq!(&buf, b"abcd");

        let mut gap = [0xFFu8; 4];
        storage.read_at(0, &mut gap).unwrap();
        assert_eq!(gap, [0; 4]);
    }

    #[test]
    fn read_past_end_fails() {
        let storage = MemoryStorage::from_bytes(vec![1, 2, 3]);
        let mut buf = [0u8; 4];
        let err = storage.read_at(0, &mut buf).unwrap_err();
        assert!(matches!(
            err,
            StoreError::OutOfRange {
                offset: 0,
                len: 4,
                size: 3
            }
        ));
        let err = storage.read_at(u64::MAX, &mut buf).unwrap_err();
        assert!(matches!(err, StoreError::OutOfRange { .. }));
    }

    #[test]
    fn set_len_truncates() {
        let mut storage = MemoryStorage::from_bytes(b"hello world".to_vec());
        storage.set_len(5).unwrap();
        assert_eq!(storage.to_bytes(), b"hello");
    }

    #[test]
    fn clones_share_content() {
        let mut storage = MemoryStorage::new();
        let observer = storage.clone();
        storage.write_at(0, b"shared").unwrap();
        assert_eq!(observer.to_bytes(), b"shared");
    }

    #[test]
    fn replace_with_swaps_content() {
        let mut storage = MemoryStorage::from_bytes(b"old content".to_vec());
        let observer = storage.clone();
        let mut scratch = storage.scratch().unwrap();
        scratch.write_at(0, b"new").unwrap();
        storage.replace_with(scratch).unwrap();
        assert_eq!(observer.to_bytes(), b"new");
    }

    #[test]
    fn poke_changes_one_byte() {
        let storage = MemoryStorage::from_bytes(vec![0; 4]);
        storage.poke(2, 9);
        assert_eq!(storage.to_bytes(), vec![0, 0, 9, 0]);
        storage.poke(10, 9);
        assert_eq!(storage.len().unwrap(), 4);
    }
}
