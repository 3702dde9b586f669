use std::fs::{File, OpenOptions, TryLockError};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::TempPath;

use crate::error::{StoreError, StoreResult};
use crate::traits::Storage;

/// Storage backed by a host file.
///
/// The file is held under an exclusive OS lock for the lifetime of the
/// value, so a second `FileStorage` on the same path (from this or another
/// process) fails with [`StoreError::Locked`]. Dropping the value closes the
/// file and releases the lock.
pub struct FileStorage {
    path: PathBuf,
    file: Mutex<File>,
    /// Set while this storage is an unpersisted scratch file.
    temp: Option<TempPath>,
}

impl FileStorage {
    /// Open the file at `path`, creating it if `create` is set.
    pub fn open(path: impl AsRef<Path>, create: bool) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create)
            .truncate(false)
            .open(&path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => StoreError::NotFound(path.clone()),
                _ => StoreError::Io(e),
            })?;
        lock_exclusive(&file, &path)?;

        tracing::debug!(path = %path.display(), "opened container file");
        Ok(Self {
            path,
            file: Mutex::new(file),
            temp: None,
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn lock_exclusive(file: &File, path: &Path) -> StoreResult<()> {
    match file.try_lock() {
        Ok(()) => Ok(()),
        Err(TryLockError::WouldBlock) => Err(StoreError::Locked(path.to_path_buf())),
        Err(TryLockError::Error(e)) => Err(StoreError::Io(e)),
    }
}

impl Storage for FileStorage {
    fn len(&self) -> StoreResult<u64> {
        let file = self.file.lock().expect("lock poisoned");
        Ok(file.metadata()?.len())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> StoreResult<()> {
        let mut file = self.file.lock().expect("lock poisoned");
        let size = file.metadata()?.len();
        let len = buf.len() as u64;
        if offset.checked_add(len).is_none_or(|end| end > size) {
            return Err(StoreError::OutOfRange { offset, len, size });
        }
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> StoreResult<()> {
        let file = self.file.get_mut().expect("lock poisoned");
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        Ok(())
    }

    fn set_len(&mut self, len: u64) -> StoreResult<()> {
        self.file.get_mut().expect("lock poisoned").set_len(len)?;
        Ok(())
    }

    fn sync(&mut self) -> StoreResult<()> {
        self.file.get_mut().expect("lock poisoned").sync_all()?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn scratch(&self) -> StoreResult<Self> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let (file, temp) = tempfile::Builder::new()
            .prefix(".matryoshka-")
            .suffix(".tmp")
            .tempfile_in(&dir)?
            .into_parts();
        lock_exclusive(&file, &temp)?;
        Ok(Self {
            path: temp.to_path_buf(),
            file: Mutex::new(file),
            temp: Some(temp),
        })
    }

    fn replace_with(&mut self, mut other: Self) -> StoreResult<()> {
        let temp = other.temp.take().ok_or_else(|| {
            StoreError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "replacement storage must come from scratch()",
            ))
        })?;
        other.sync()?;
        // Nothing may fail after the rename.
        temp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;

        // Dropping the old handle releases the lock on the replaced inode.
        self.file = other.file;
        tracing::debug!(path = %self.path.display(), "replaced container file");
        Ok(())
    }
}

impl std::fmt::Debug for FileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStorage")
            .field("path", &self.path)
            .field("scratch", &self.temp.is_some())
            .finish()
    }
}
