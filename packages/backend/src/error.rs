//! Error types for the storage layer.
//!
//! Errors at this level are about the storage medium only. Semantic errors
//! like "this leaf doesn't parse as an integer" belong to the codec.

use std::path::PathBuf;

/// Errors raised by a [`Backend`](crate::Backend).
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    /// Nothing exists at the path.
    #[error("no such entry: {}", .0.display())]
    NotFound(PathBuf),

    /// A directory operation was attempted on something that isn't one.
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Generic I/O failure from the underlying medium.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A lock guarding in-process state was poisoned by a panicking writer.
    #[error("lock poisoned")]
    Poisoned,
}

impl StorageError {
    /// Map an I/O error for `path`, keeping "not found" distinguishable.
    pub fn from_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(path.into()),
            _ => StorageError::Transport(Box::new(err)),
        }
    }

    /// Whether this error means the entry simply isn't there.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Transport(Box::new(e))
    }
}
