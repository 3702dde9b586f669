use std::fmt;
use std::io;
use std::path::PathBuf;

use matryoshka_index::IndexError;
use matryoshka_pack::PackError;
use matryoshka_store::StoreError;
use matryoshka_types::TypeError;
use serde::Serialize;
use thiserror::Error;

use crate::handle::EntryHandle;

/// Coarse failure classes reported to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing container file or missing inner path.
    NotFound,
    /// The container failed structural or checksum validation.
    Corrupt,
    /// Read or write failure against backing storage or a host file.
    IoFailure,
    /// Push targeted a path that already exists.
    DuplicatePath,
    /// Handle from a closed or different container, or to a deleted entry.
    InvalidHandle,
    /// Push was given a host file that does not exist.
    SourceNotFound,
    /// Malformed argument, such as an empty inner path.
    InvalidArgument,
    /// Ranged read past the end of an entry.
    OutOfBounds,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not found",
            Self::Corrupt => "corrupt",
            Self::IoFailure => "i/o failure",
            Self::DuplicatePath => "duplicate path",
            Self::InvalidHandle => "invalid handle",
            Self::SourceNotFound => "source not found",
            Self::InvalidArgument => "invalid argument",
            Self::OutOfBounds => "out of bounds",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum VfsError {
    #[error("container not found: {}", .0.display())]
    ContainerNotFound(PathBuf),

    #[error("no entry at '{0}'")]
    EntryNotFound(String),

    #[error("source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("entry already exists: '{0}'")]
    DuplicatePath(String),

    #[error("invalid entry handle {0}")]
    InvalidHandle(EntryHandle),

    #[error("container is closed")]
    Closed,

    #[error("container is in use by another handle: {}", .0.display())]
    Locked(PathBuf),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("range {offset}+{len} exceeds entry size {size}")]
    OutOfBounds { offset: u64, len: u64, size: u64 },

    #[error("corrupt container: {0}")]
    Corrupt(PackError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Pack(PackError),
}

impl VfsError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// The failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ContainerNotFound(_) | Self::EntryNotFound(_) => ErrorKind::NotFound,
            Self::SourceNotFound(_) => ErrorKind::SourceNotFound,
            Self::DuplicatePath(_) => ErrorKind::DuplicatePath,
            Self::InvalidHandle(_) | Self::Closed => ErrorKind::InvalidHandle,
            Self::InvalidArgument(_) | Self::Config(_) => ErrorKind::InvalidArgument,
            Self::OutOfBounds { .. } => ErrorKind::OutOfBounds,
            Self::Corrupt(_) => ErrorKind::Corrupt,
            Self::Locked(_) | Self::Io { .. } | Self::Pack(_) => ErrorKind::IoFailure,
        }
    }
}

impl From<PackError> for VfsError {
    fn from(err: PackError) -> Self {
        match err.flatten() {
            PackError::OutOfBounds { offset, len, size } => Self::OutOfBounds { offset, len, size },
            PackError::Store(StoreError::NotFound(path)) => Self::ContainerNotFound(path),
            PackError::Store(StoreError::Locked(path)) => Self::Locked(path),
            PackError::Index(IndexError::DuplicatePath(path)) => Self::DuplicatePath(path),
            err if err.is_corruption() => Self::Corrupt(err),
            err => Self::Pack(err),
        }
    }
}

impl From<StoreError> for VfsError {
    fn from(err: StoreError) -> Self {
        PackError::Store(err).into()
    }
}

impl From<IndexError> for VfsError {
    fn from(err: IndexError) -> Self {
        PackError::Index(err).into()
    }
}

impl From<TypeError> for VfsError {
    fn from(err: TypeError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

pub type VfsResult<T> = Result<T, VfsError>;
