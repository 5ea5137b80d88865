//! The local filesystem backend.

use std::fs;
use std::io::Write;
use std::path::Path;

use bytes::Bytes;

use crate::{Backend, Entry, StorageError};

/// A backend over the host filesystem.
///
/// Paths are used as given; relative paths resolve against the process's
/// working directory. Leaf writes go to a temporary file in the target's
/// directory which is then renamed over the target, so readers never see a
/// half-written leaf.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalDisk;

impl LocalDisk {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for LocalDisk {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), StorageError> {
        tracing::trace!(path = %path.display(), "creating directory");
        fs::create_dir_all(path).map_err(|e| StorageError::from_io(path, e))
    }

    fn write_atomic(&self, path: &Path, data: Bytes) -> Result<(), StorageError> {
        tracing::trace!(path = %path.display(), len = data.len(), "writing leaf");

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        if !parent.is_dir() {
            return Err(StorageError::NotFound(parent.to_path_buf()));
        }

        let mut staged =
            tempfile::NamedTempFile::new_in(parent).map_err(|e| StorageError::from_io(parent, e))?;
        staged.write_all(&data)?;
        staged.as_file().sync_all()?;
        staged
            .persist(path)
            .map_err(|e| StorageError::from_io(path, e.error))?;

        Ok(())
    }

    fn read(&self, path: &Path) -> Result<Bytes, StorageError> {
        tracing::trace!(path = %path.display(), "reading leaf");
        fs::read(path)
            .map(Bytes::from)
            .map_err(|e| StorageError::from_io(path, e))
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<Entry>, StorageError> {
        tracing::trace!(path = %path.display(), "listing directory");
        let attr = fs::metadata(path).map_err(|e| StorageError::from_io(path, e))?;
        if !attr.is_dir() {
            return Err(StorageError::NotADirectory(path.to_path_buf()));
        }

        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(path).map_err(|e| StorageError::from_io(path, e))? {
            let dir_entry = dir_entry?;
            // Names that aren't UTF-8 can't be keys or indices; skip them.
            let Ok(name) = dir_entry.file_name().into_string() else {
                continue;
            };
            let is_dir = dir_entry.file_type()?.is_dir();
            entries.push(Entry { name, is_dir });
        }
        Ok(entries)
    }
}
