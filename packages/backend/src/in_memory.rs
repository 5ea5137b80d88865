//! An in-memory backend.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;

use bytes::Bytes;

use crate::{Backend, Entry, StorageError};

#[derive(Clone, Debug)]
enum Node {
    Dir,
    File(Bytes),
}

/// A backend that keeps the whole tree in process memory.
///
/// Behaves like a filesystem rooted at `/`: writing a leaf requires its
/// parent directory to exist, and listings come back in no particular
/// order. Paths are normalized lexically (`.` dropped, `..` popped), and
/// relative paths are treated as relative to the root.
///
/// # Example
///
/// ```rust
/// use std::path::Path;
/// use treefs_backend::{Backend, InMemory};
/// use bytes::Bytes;
///
/// let store = InMemory::new();
/// store.create_dir_all(Path::new("/person")).unwrap();
/// store.write_atomic(Path::new("/person/name.txt"), Bytes::from_static(b"Alice")).unwrap();
///
/// assert_eq!(store.read(Path::new("/person/name.txt")).unwrap(), Bytes::from_static(b"Alice"));
/// ```
#[derive(Debug)]
pub struct InMemory {
    nodes: RwLock<HashMap<PathBuf, Node>>,
}

impl InMemory {
    /// Create a new store holding only the root directory.
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(PathBuf::from("/"), Node::Dir);
        Self {
            nodes: RwLock::new(nodes),
        }
    }

    /// Number of files and directories held, root included.
    pub fn len(&self) -> usize {
        self.nodes.read().map(|n| n.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    fn normalize(path: &Path) -> PathBuf {
        let mut out = PathBuf::from("/");
        for component in path.components() {
            match component {
                Component::Normal(c) => out.push(c),
                Component::ParentDir => {
                    out.pop();
                }
                Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
            }
        }
        out
    }
}

impl Default for InMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for InMemory {
    fn exists(&self, path: &Path) -> bool {
        let key = Self::normalize(path);
        self.nodes
            .read()
            .map(|nodes| nodes.contains_key(&key))
            .unwrap_or(false)
    }

    fn is_dir(&self, path: &Path) -> bool {
        let key = Self::normalize(path);
        self.nodes
            .read()
            .map(|nodes| matches!(nodes.get(&key), Some(Node::Dir)))
            .unwrap_or(false)
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), StorageError> {
        let key = Self::normalize(path);
        let mut nodes = self.nodes.write().map_err(|_| StorageError::Poisoned)?;

        // Check every ancestor first so a failure leaves nothing behind.
        for ancestor in key.ancestors() {
            if let Some(Node::File(_)) = nodes.get(ancestor) {
                return Err(StorageError::NotADirectory(ancestor.to_path_buf()));
            }
        }
        for ancestor in key.ancestors() {
            nodes.entry(ancestor.to_path_buf()).or_insert(Node::Dir);
        }
        Ok(())
    }

    fn write_atomic(&self, path: &Path, data: Bytes) -> Result<(), StorageError> {
        let key = Self::normalize(path);
        let mut nodes = self.nodes.write().map_err(|_| StorageError::Poisoned)?;

        let parent = key.parent().unwrap_or(Path::new("/"));
        match nodes.get(parent) {
            Some(Node::Dir) => {}
            Some(Node::File(_)) => return Err(StorageError::NotADirectory(parent.to_path_buf())),
            None => return Err(StorageError::NotFound(parent.to_path_buf())),
        }
        if let Some(Node::Dir) = nodes.get(&key) {
            return Err(StorageError::Transport(
                format!("cannot replace directory {} with a file", key.display()).into(),
            ));
        }

        nodes.insert(key, Node::File(data));
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<Bytes, StorageError> {
        let key = Self::normalize(path);
        let nodes = self.nodes.read().map_err(|_| StorageError::Poisoned)?;
        match nodes.get(&key) {
            Some(Node::File(data)) => Ok(data.clone()),
            Some(Node::Dir) => Err(StorageError::Transport(
                format!("{} is a directory", key.display()).into(),
            )),
            None => Err(StorageError::NotFound(key)),
        }
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<Entry>, StorageError> {
        let key = Self::normalize(path);
        let nodes = self.nodes.read().map_err(|_| StorageError::Poisoned)?;
        match nodes.get(&key) {
            Some(Node::Dir) => {}
            Some(Node::File(_)) => return Err(StorageError::NotADirectory(key)),
            None => return Err(StorageError::NotFound(key)),
        }

        Ok(nodes
            .iter()
            .filter(|(p, _)| p.parent() == Some(key.as_path()))
            .filter_map(|(p, node)| {
                let name = p.file_name()?.to_str()?.to_string();
                Some(Entry {
                    name,
                    is_dir: matches!(node, Node::Dir),
                })
            })
            .collect())
    }
}
