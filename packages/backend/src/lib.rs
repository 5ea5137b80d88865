//! treefs storage backends
//!
//! This is the bottom layer of treefs. It knows about directories, leaf
//! files and listings, and nothing about what the bytes mean:
//! - `Backend`: the storage trait the codec consumes
//! - `LocalDisk`: the host filesystem, with atomic leaf writes
//! - `InMemory`: a process-local tree, handy for tests and scratch work
//!
//! # Example
//!
//! ```rust
//! use std::path::Path;
//! use treefs_backend::{Backend, StorageError};
//!
//! fn leaf_names(backend: &dyn Backend, dir: &Path) -> Result<Vec<String>, StorageError> {
//!     Ok(backend
//!         .list_dir(dir)?
//!         .into_iter()
//!         .filter(|e| !e.is_dir)
//!         .map(|e| e.name)
//!         .collect())
//! }
//! ```

pub use bytes::Bytes;

mod error;
mod in_memory;
mod local_disk;
mod traits;

pub use error::StorageError;
pub use in_memory::InMemory;
pub use local_disk::LocalDisk;
pub use traits::{Backend, Entry};
