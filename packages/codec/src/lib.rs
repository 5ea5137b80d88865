//! treefs - structured values as directory trees
//!
//! Any `serde` value can be exploded into a directory tree and read back:
//! - a scalar leaf is a file `name.ext` holding its text rendering
//! - a record or map is a directory with one entry per present field
//! - a sequence is a directory with entries `0`, `1`, `2`, ...
//! - an absent value is the absence of any entry
//!
//! The crate is layered:
//! - `scalar`: the closed set of leaf kinds and their byte form
//! - `path`: where a field, element or leaf lives on disk
//! - `encode` / `decode`: the traversal engine, as a serde `Serializer`
//!   and `Deserializer`
//! - `codec`: the [`TreeCodec`] facade, with blocking and async entry
//!   points and an admission gate
//!
//! Storage goes through the [`Backend`] trait from `treefs-backend`.
//!
//! # Blocking and async callers
//!
//! [`TreeCodec::encode`] and [`TreeCodec::decode`] block the calling
//! thread while they wait for the admission gate. Inside a tokio runtime
//! that panics, as any `blocking_*` lock call does. From async code use
//! [`TreeCodec::encode_async`] and [`TreeCodec::decode_async`], or move
//! the blocking call onto the blocking pool:
//!
//! ```rust
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use treefs::{InMemory, TreeCodec};
//!
//! let codec = TreeCodec::builder().backend(InMemory::new()).build();
//! let back = tokio::task::spawn_blocking(move || {
//!     codec.encode(&vec![1i64, 2], "/xs").unwrap();
//!     codec.decode::<Vec<i64>>("/xs").unwrap()
//! })
//! .await
//! .unwrap();
//! assert_eq!(back, vec![1, 2]);
//! # }
//! ```
//!
//! # Example
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use treefs::{Backend, InMemory, TreeCodec};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[derive(Serialize, Deserialize, Debug, PartialEq)]
//! struct Person {
//!     name: String,
//!     age: i64,
//!     nickname: Option<String>,
//! }
//!
//! let disk = Arc::new(InMemory::new());
//! let codec = TreeCodec::builder().backend(Arc::clone(&disk)).build();
//!
//! let alice = Person { name: "Alice".into(), age: 38, nickname: None };
//! codec.encode(&alice, "/people/alice").unwrap();
//!
//! assert_eq!(&disk.read(Path::new("/people/alice/age.txt")).unwrap()[..], b"38");
//! assert!(!disk.exists(Path::new("/people/alice/nickname.txt")));
//!
//! let back: Person = codec.decode("/people/alice").unwrap();
//! assert_eq!(back, alice);
//! ```

mod codec;
mod config;
mod context;
mod decode;
mod encode;
mod error;
mod path;
mod scalar;
mod value;

pub use codec::{TreeCodec, TreeCodecBuilder};
pub use config::{CodecConfig, ConfigError};
pub use error::{CodingKey, CodingPath, Error};
pub use path::{Extension, PathResolver, DEFAULT_EXTENSION};
pub use scalar::{RawValue, Scalar, ScalarError, ScalarKind};
pub use value::Value;

pub use treefs_backend::{Backend, Bytes, Entry, InMemory, LocalDisk, StorageError};
