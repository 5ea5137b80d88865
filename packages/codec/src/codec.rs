//! The top-level codec facade.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use treefs_backend::{Backend, LocalDisk};

use crate::config::CodecConfig;
use crate::context::Context;
use crate::decode::ValueDecoder;
use crate::encode::ValueEncoder;
use crate::error::Error;
use crate::path::{check_root, Extension, PathResolver};

/// Encodes values into directory trees and decodes them back.
///
/// A codec owns its leaf extension, its storage backend and an admission
/// gate. Encodes are exclusive: one at a time, and no decode through the
/// same codec runs alongside one. Decodes share the gate and run
/// concurrently. Admission is first come, first served.
///
/// Clones share the backend and the gate.
///
/// # Panics
///
/// The blocking [`encode`](Self::encode) and [`decode`](Self::decode) wait
/// on the gate synchronously and panic if called from within an async
/// runtime. Use the `_async` variants there.
#[derive(Clone)]
pub struct TreeCodec {
    resolver: PathResolver,
    backend: Arc<dyn Backend>,
    gate: Arc<RwLock<()>>,
}

impl TreeCodec {
    /// A codec writing `.txt` leaves to the local filesystem.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> TreeCodecBuilder {
        TreeCodecBuilder::default()
    }

    /// A local filesystem codec configured from `config`.
    pub fn from_config(config: &CodecConfig) -> Self {
        Self::builder().extension(&config.extension).build()
    }

    pub fn extension(&self) -> &Extension {
        self.resolver.extension()
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Encode `value` as the tree rooted at `path`.
    ///
    /// A scalar becomes the single leaf `path.ext`; a composite becomes the
    /// directory `path`. Missing parent directories are created. Existing
    /// entries the value doesn't mention are left alone.
    pub fn encode<T>(&self, value: &T, path: impl AsRef<Path>) -> Result<(), Error>
    where
        T: Serialize + ?Sized,
    {
        let path = path.as_ref();
        validate(path)?;
        let _admitted = self.gate.blocking_write();
        self.run_encode(value, path)
    }

    /// Decode the tree rooted at `path` as a `T`.
    pub fn decode<T>(&self, path: impl AsRef<Path>) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let path = path.as_ref();
        validate(path)?;
        let _admitted = self.gate.blocking_read();
        self.run_decode(path)
    }

    /// Like [`encode`](Self::encode), suspending until admitted. The
    /// traversal runs to completion on the blocking pool.
    #[cfg(feature = "async")]
    pub async fn encode_async<T>(&self, value: T, path: impl Into<PathBuf>) -> Result<(), Error>
    where
        T: Serialize + Send + 'static,
    {
        let path = path.into();
        validate(&path)?;
        let admitted = Arc::clone(&self.gate).write_owned().await;
        let codec = self.clone();
        tokio::task::spawn_blocking(move || {
            let _admitted = admitted;
            codec.run_encode(&value, &path)
        })
        .await
        .map_err(|e| Error::Interrupted {
            message: e.to_string(),
        })?
    }

    /// Like [`decode`](Self::decode), suspending until admitted.
    #[cfg(feature = "async")]
    pub async fn decode_async<T>(&self, path: impl Into<PathBuf>) -> Result<T, Error>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let path = path.into();
        validate(&path)?;
        let admitted = Arc::clone(&self.gate).read_owned().await;
        let codec = self.clone();
        tokio::task::spawn_blocking(move || {
            let _admitted = admitted;
            codec.run_decode(&path)
        })
        .await
        .map_err(|e| Error::Interrupted {
            message: e.to_string(),
        })?
    }

    fn run_encode<T>(&self, value: &T, path: &Path) -> Result<(), Error>
    where
        T: Serialize + ?Sized,
    {
        tracing::debug!(path = %path.display(), extension = %self.extension(), "encoding tree");
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.backend
                .create_dir_all(parent)
                .map_err(|e| Error::write(parent, e))?;
        }
        let ctx = Context::root(&self.resolver, self.backend.as_ref(), path);
        value.serialize(ValueEncoder::new(ctx))
    }

    fn run_decode<T>(&self, path: &Path) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        tracing::debug!(path = %path.display(), extension = %self.extension(), "decoding tree");
        let ctx = Context::root(&self.resolver, self.backend.as_ref(), path);
        T::deserialize(ValueDecoder::new(ctx))
    }
}

impl Default for TreeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TreeCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeCodec")
            .field("extension", self.extension())
            .finish_non_exhaustive()
    }
}

fn validate(path: &Path) -> Result<(), Error> {
    check_root(path).map_err(|message| Error::InvalidPath {
        path: path.to_path_buf(),
        message: message.to_string(),
    })
}

/// Builds a [`TreeCodec`].
///
/// ```rust
/// use treefs::{InMemory, TreeCodec};
///
/// let codec = TreeCodec::builder()
///     .extension("md")
///     .backend(InMemory::new())
///     .build();
/// assert_eq!(codec.extension().as_str(), ".md");
/// ```
#[derive(Default)]
pub struct TreeCodecBuilder {
    extension: Option<Extension>,
    backend: Option<Arc<dyn Backend>>,
}

impl TreeCodecBuilder {
    /// Leaf file extension; a leading `.` is added if missing.
    pub fn extension(mut self, extension: impl AsRef<str>) -> Self {
        self.extension = Some(Extension::new(extension));
        self
    }

    /// Storage backend. Defaults to [`LocalDisk`].
    pub fn backend(mut self, backend: impl Backend + 'static) -> Self {
        self.backend = Some(Arc::new(backend));
        self
    }

    pub fn build(self) -> TreeCodec {
        TreeCodec {
            resolver: PathResolver::new(self.extension.unwrap_or_default()),
            backend: self.backend.unwrap_or_else(|| Arc::new(LocalDisk::new())),
            gate: Arc::new(RwLock::new(())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use treefs_backend::InMemory;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Person {
        name: String,
        age: i64,
    }

    fn in_memory() -> (TreeCodec, Arc<InMemory>) {
        let backend = Arc::new(InMemory::new());
        let codec = TreeCodec::builder().backend(Arc::clone(&backend)).build();
        (codec, backend)
    }

    #[test]
    fn defaults() {
        let codec = TreeCodec::new();
        assert_eq!(codec.extension().as_str(), ".txt");
        assert_eq!(
            TreeCodec::from_config(&CodecConfig {
                extension: "json".to_string()
            })
            .extension()
            .as_str(),
            ".json"
        );
    }

    #[test]
    fn encode_creates_missing_parents() {
        let (codec, backend) = in_memory();
        let alice = Person {
            name: "Alice".to_string(),
            age: 38,
        };

        codec.encode(&alice, "/data/people/alice").unwrap();
        assert!(backend.is_dir(Path::new("/data/people/alice")));

        let back: Person = codec.decode("/data/people/alice").unwrap();
        assert_eq!(back, alice);
    }

    #[test]
    fn rootless_paths_are_invalid() {
        let (codec, _) = in_memory();
        for path in ["", "/", "/tmp/.."] {
            assert!(matches!(
                codec.encode(&1i64, path),
                Err(Error::InvalidPath { .. })
            ));
            assert!(matches!(
                codec.decode::<i64>(path),
                Err(Error::InvalidPath { .. })
            ));
        }
    }

    #[test]
    fn clones_share_storage() {
        let (codec, _) = in_memory();
        let other = codec.clone();
        codec.encode("shared", "/x").unwrap();
        assert_eq!(other.decode::<String>("/x").unwrap(), "shared");
    }

    #[test]
    fn debug_shows_extension() {
        let (codec, _) = in_memory();
        assert!(format!("{:?}", codec).contains(".txt"));
    }
}
