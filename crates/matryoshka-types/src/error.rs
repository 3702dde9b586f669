use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("path refers to the container root")]
    EmptyPath,

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },
}
