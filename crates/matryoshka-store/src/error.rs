use std::path::PathBuf;

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing file does not exist and creation was not requested.
    #[error("container file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Another handle already holds the backing file.
    #[error("container file is locked by another process or handle: {}", .0.display())]
    Locked(PathBuf),

    /// A read extends past the end of the storage.
    #[error("read of {len} bytes at offset {offset} exceeds storage size {size}")]
    OutOfRange { offset: u64, len: u64, size: u64 },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;
