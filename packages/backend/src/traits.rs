//! The storage trait consumed by the codec.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;

use crate::StorageError;

/// One entry of a directory listing.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Entry {
    /// The entry's file name, extension included.
    pub name: String,
    /// Whether the entry is itself a directory.
    pub is_dir: bool,
}

impl Entry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
        }
    }
}

/// A place to keep a tree of directories and leaf files.
///
/// Every method takes `&self`: a backend is shared between concurrent
/// decodes, so implementations synchronize internally.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Arc<dyn Backend>`.
pub trait Backend: Send + Sync {
    /// Whether a file or directory exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Whether a directory exists at `path`.
    fn is_dir(&self, path: &Path) -> bool;

    /// Create `path` and any missing parents.
    ///
    /// Creating a directory that already exists is not an error.
    fn create_dir_all(&self, path: &Path) -> Result<(), StorageError>;

    /// Replace the file at `path` with `data`.
    ///
    /// A concurrent reader sees either the old content or the new content,
    /// never a partial write.
    fn write_atomic(&self, path: &Path, data: Bytes) -> Result<(), StorageError>;

    /// Read the whole file at `path`.
    ///
    /// # Returns
    ///
    /// * `Err(StorageError::NotFound)` - Nothing exists at `path`.
    fn read(&self, path: &Path) -> Result<Bytes, StorageError>;

    /// List the entries directly inside the directory at `path`.
    ///
    /// No ordering is promised.
    fn list_dir(&self, path: &Path) -> Result<Vec<Entry>, StorageError>;
}

// Blanket implementations for references and smart pointers

impl<T: Backend + ?Sized> Backend for &T {
    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        (**self).is_dir(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), StorageError> {
        (**self).create_dir_all(path)
    }

    fn write_atomic(&self, path: &Path, data: Bytes) -> Result<(), StorageError> {
        (**self).write_atomic(path, data)
    }

    fn read(&self, path: &Path) -> Result<Bytes, StorageError> {
        (**self).read(path)
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<Entry>, StorageError> {
        (**self).list_dir(path)
    }
}

impl<T: Backend + ?Sized> Backend for Box<T> {
    fn exists(&self, path: &Path) -> bool {
        self.as_ref().exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.as_ref().is_dir(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), StorageError> {
        self.as_ref().create_dir_all(path)
    }

    fn write_atomic(&self, path: &Path, data: Bytes) -> Result<(), StorageError> {
        self.as_ref().write_atomic(path, data)
    }

    fn read(&self, path: &Path) -> Result<Bytes, StorageError> {
        self.as_ref().read(path)
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<Entry>, StorageError> {
        self.as_ref().list_dir(path)
    }
}

impl<T: Backend + ?Sized> Backend for Arc<T> {
    fn exists(&self, path: &Path) -> bool {
        self.as_ref().exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.as_ref().is_dir(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), StorageError> {
        self.as_ref().create_dir_all(path)
    }

    fn write_atomic(&self, path: &Path, data: Bytes) -> Result<(), StorageError> {
        self.as_ref().write_atomic(path, data)
    }

    fn read(&self, path: &Path) -> Result<Bytes, StorageError> {
        self.as_ref().read(path)
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<Entry>, StorageError> {
        self.as_ref().list_dir(path)
    }
}
