use matryoshka_vfs::VfsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("container error: {0}")]
    Container(#[from] VfsError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ServerResult<T> = Result<T, ServerError>;
