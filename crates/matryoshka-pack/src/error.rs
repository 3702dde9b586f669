use matryoshka_index::IndexError;
use matryoshka_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackError {
    #[error("invalid container magic: expected {expected}, got {actual}")]
    InvalidMagic { expected: String, actual: String },

    #[error("unsupported container version: {0}")]
    UnsupportedVersion(u32),

    #[error("container header truncated: {0} bytes")]
    TruncatedHeader(u64),

    #[error("container header checksum mismatch")]
    HeaderChecksumMismatch,

    #[error("index region {offset}..{end} lies outside the container ({size} bytes)")]
    IndexOutOfBounds { offset: u64, end: u64, size: u64 },

    #[error("index checksum mismatch")]
    IndexChecksumMismatch,

    #[error("stored index is invalid: {0}")]
    CorruptIndex(IndexError),

    #[error("CRC32 mismatch in chunk {seq} at offset {offset}")]
    ChunkCrcMismatch { seq: u32, offset: u64 },

    #[error("range {offset}+{len} exceeds entry size {size}")]
    OutOfBounds { offset: u64, len: u64, size: u64 },

    #[error("source changed during ingest: expected {expected} bytes, read {actual}")]
    SourceChanged { expected: u64, actual: u64 },

    #[error("failed to read source: {0}")]
    Source(std::io::Error),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl PackError {
    /// Returns `true` for errors that mean the container content is damaged.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::InvalidMagic { .. }
                | Self::UnsupportedVersion(_)
                | Self::TruncatedHeader(_)
                | Self::HeaderChecksumMismatch
                | Self::IndexOutOfBounds { .. }
                | Self::IndexChecksumMismatch
                | Self::CorruptIndex(_)
                | Self::ChunkCrcMismatch { .. }
        )
    }

    /// Unwrap a `PackError` that travelled through an `io::Read` source.
    pub fn flatten(self) -> Self {
        match self {
            Self::Source(e) => match e.downcast::<PackError>() {
                Ok(inner) => inner.flatten(),
                Err(e) => Self::Source(e),
            },
            other => other,
        }
    }
}

pub type PackResult<T> = Result<T, PackError>;
