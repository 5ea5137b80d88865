//! Path resolution: where a field, an index or a leaf lives on disk.

use std::ffi::OsString;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use treefs_backend::{Backend, Entry};

/// The extension used when none is configured.
pub const DEFAULT_EXTENSION: &str = ".txt";

/// A leaf file extension, always beginning with `.`.
///
/// # Example
///
/// ```rust
/// use treefs::Extension;
///
/// assert_eq!(Extension::new("json").as_str(), ".json");
/// assert_eq!(Extension::new(".json").as_str(), ".json");
/// assert_eq!(Extension::new("").as_str(), ".txt");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Extension(String);

impl Extension {
    pub fn new(ext: impl AsRef<str>) -> Self {
        let ext = ext.as_ref().trim();
        if ext.is_empty() || ext == "." {
            return Self::default();
        }
        if ext.starts_with('.') {
            Self(ext.to_string())
        } else {
            Self(format!(".{}", ext))
        }
    }

    /// The extension with its leading separator, e.g. `.txt`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Extension {
    fn default() -> Self {
        Self(DEFAULT_EXTENSION.to_string())
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps logical names to filesystem paths for one configured extension.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathResolver {
    extension: Extension,
}

impl PathResolver {
    pub fn new(extension: Extension) -> Self {
        Self { extension }
    }

    pub fn extension(&self) -> &Extension {
        &self.extension
    }

    /// The path of child `name` under `base`.
    pub fn child_path(&self, base: &Path, name: &str) -> PathBuf {
        base.join(name)
    }

    /// The file a scalar stored at `path` lives in: `path` with the
    /// extension appended to its final component.
    pub fn leaf_file(&self, path: &Path) -> PathBuf {
        let mut file: OsString = path.as_os_str().to_owned();
        file.push(self.extension.as_str());
        PathBuf::from(file)
    }

    /// Whether a value is stored at `path`, as a branch or as a leaf.
    ///
    /// True if anything exists at `path` itself, or a file exists at
    /// `leaf_file(path)`. Every presence test goes through here so the
    /// encode and decode sides agree on what "present" means.
    pub fn exists_as_value(&self, path: &Path, backend: &dyn Backend) -> bool {
        if backend.exists(path) {
            return true;
        }
        let leaf = self.leaf_file(path);
        backend.exists(&leaf) && !backend.is_dir(&leaf)
    }

    /// The logical key a directory entry stands for.
    ///
    /// Files lose their extension, whatever it is. Directories are
    /// composites, named bare, and keep their full name.
    pub fn entry_key<'e>(&self, entry: &'e Entry) -> &'e str {
        if entry.is_dir {
            return &entry.name;
        }
        if let Some(stem) = entry.name.strip_suffix(self.extension.as_str()) {
            if !stem.is_empty() {
                return stem;
            }
        }
        match entry.name.rfind('.') {
            Some(dot) if dot > 0 => &entry.name[..dot],
            _ => &entry.name,
        }
    }
}

/// Parse a sequence entry key: a non-negative decimal integer.
pub(crate) fn parse_index(key: &str) -> Option<usize> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

/// Whether `name` can be a single path component in a tree.
pub(crate) fn is_valid_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(|c: char| matches!(c, '/' | '\\' | '\0'))
}

/// Whether a tree can be rooted at `path`.
///
/// The root needs a final normal component to hang the leaf extension on.
pub(crate) fn check_root(path: &Path) -> Result<(), &'static str> {
    match path.components().next_back() {
        Some(Component::Normal(_)) => Ok(()),
        Some(_) => Err("path must end in a file or directory name"),
        None => Err("path is empty"),
    }
}
