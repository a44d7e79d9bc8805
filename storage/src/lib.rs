mod executor;
mod lock;
mod record;

pub use executor::{content_digest, ApplyOutcome, FileExecutor};
pub use lock::{LockGuard, LockSet};
pub use record::{validate_name, FileId, FileRecord};

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("File {0} is locked for renaming")]
    FileLocked(FileId),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("File already exists: {0}")]
    DuplicateFile(String),

    #[error("Invalid file name: {0:?}")]
    InvalidName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
