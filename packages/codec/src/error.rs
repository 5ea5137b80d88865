//! Error types for the codec.

use std::fmt;
use std::path::PathBuf;

use treefs_backend::StorageError;

use crate::scalar::ScalarError;

/// One step of a coding path: a field name or a sequence index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CodingKey {
    Field(String),
    Index(usize),
}

impl fmt::Display for CodingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodingKey::Field(name) => write!(f, "{}", name),
            CodingKey::Index(i) => write!(f, "{}", i),
        }
    }
}

/// The keys and indices traversed to reach a container.
///
/// Only used for diagnostics. Displays as `items/2/name`, or `<root>` when
/// empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodingPath(Vec<CodingKey>);

impl CodingPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// A new path with `key` appended.
    pub fn child(&self, key: CodingKey) -> Self {
        let mut keys = self.0.clone();
        keys.push(key);
        Self(keys)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> &[CodingKey] {
        &self.0
    }
}

impl fmt::Display for CodingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", key)?;
        }
        Ok(())
    }
}

/// Errors raised while encoding to or decoding from a tree.
///
/// Every error propagates unchanged up to the facade call. Nothing is
/// retried and a failed encode may leave a partially written tree.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The value or target kind is outside the recognized scalar set and
    /// has no composite representation.
    #[error("unsupported type at {path}: {message}")]
    UnsupportedType { path: CodingPath, message: String },

    /// A recognized kind failed to format, or a key couldn't be rendered.
    #[error("encoding failed at {path}: {message}")]
    EncodingFailed { path: CodingPath, message: String },

    /// Stored content didn't parse into the requested kind.
    #[error("decoding failed at {path}: {message}")]
    DecodingFailed { path: CodingPath, message: String },

    /// The backend failed to read a leaf or list a directory.
    #[error("failed to read {}: {source}", .file.display())]
    FileRead {
        file: PathBuf,
        #[source]
        source: StorageError,
    },

    /// The backend failed to create a directory or write a leaf.
    #[error("failed to write {}: {source}", .file.display())]
    FileWrite {
        file: PathBuf,
        #[source]
        source: StorageError,
    },

    /// The caller supplied a target path the tree can't be rooted at.
    #[error("invalid path {}: {message}", .path.display())]
    InvalidPath { path: PathBuf, message: String },

    /// An async traversal didn't run to completion.
    #[error("traversal interrupted: {message}")]
    Interrupted { message: String },
}

impl Error {
    pub(crate) fn unsupported(path: &CodingPath, message: impl Into<String>) -> Self {
        Error::UnsupportedType {
            path: path.clone(),
            message: message.into(),
        }
    }

    pub(crate) fn encoding(path: &CodingPath, message: impl Into<String>) -> Self {
        Error::EncodingFailed {
            path: path.clone(),
            message: message.into(),
        }
    }

    pub(crate) fn decoding(path: &CodingPath, message: impl Into<String>) -> Self {
        Error::DecodingFailed {
            path: path.clone(),
            message: message.into(),
        }
    }

    pub(crate) fn read(file: impl Into<PathBuf>, source: StorageError) -> Self {
        Error::FileRead {
            file: file.into(),
            source,
        }
    }

    pub(crate) fn write(file: impl Into<PathBuf>, source: StorageError) -> Self {
        Error::FileWrite {
            file: file.into(),
            source,
        }
    }

    /// Lift a scalar codec failure to the coding path it happened at.
    pub(crate) fn scalar(path: &CodingPath, err: ScalarError) -> Self {
        Error::decoding(path, err.to_string())
    }

    /// Attribute an error raised by a serde impl to `path`.
    ///
    /// `custom` errors are created without knowing where they happened;
    /// the innermost container they pass through claims them.
    pub(crate) fn at(self, path: &CodingPath) -> Self {
        match self {
            Error::UnsupportedType { path: p, message } if p.is_root() => {
                Error::unsupported(path, message)
            }
            Error::EncodingFailed { path: p, message } if p.is_root() => {
                Error::encoding(path, message)
            }
            Error::DecodingFailed { path: p, message } if p.is_root() => {
                Error::decoding(path, message)
            }
            other => other,
        }
    }

    /// The coding path the error is tied to, if it has one.
    pub fn coding_path(&self) -> Option<&CodingPath> {
        match self {
            Error::UnsupportedType { path, .. }
            | Error::EncodingFailed { path, .. }
            | Error::DecodingFailed { path, .. } => Some(path),
            _ => None,
        }
    }
}

impl serde::ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::encoding(&CodingPath::root(), msg.to_string())
    }
}

impl serde::de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::decoding(&CodingPath::root(), msg.to_string())
    }
}
