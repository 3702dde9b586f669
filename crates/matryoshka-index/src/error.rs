//! Error types for the index crate.

use matryoshka_types::EntryId;

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The path is already taken by another entry.
    #[error("path already exists: {0}")]
    DuplicatePath(String),

    /// The entry id is already taken by another entry.
    #[error("entry id already in use: {0}")]
    DuplicateId(EntryId),

    /// The specified path was not found in the index.
    #[error("path not found in index: {0}")]
    PathNotFound(String),

    /// No entry carries the specified id.
    #[error("entry not found: {0}")]
    EntryNotFound(EntryId),

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The index decoded but violates a structural invariant.
    #[error("index corrupted: {0}")]
    Corrupted(String),
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;
