use media_files::{ErrorKind, FilesError};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Files(#[from] FilesError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("upload session is closed")]
    SessionClosed,
}

impl CoreError {
    /// Failure category for transports. Anything that is not a storage rule violation is an
    /// I/O failure from the caller's point of view.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Files(e) => e.kind(),
            _ => ErrorKind::Io,
        }
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
