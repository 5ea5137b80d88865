//! Per-container traversal state.

use std::path::{Path, PathBuf};

use treefs_backend::Backend;

use crate::error::{CodingKey, CodingPath};
use crate::path::PathResolver;

/// Where a container is and how it reaches storage.
///
/// One context per container. A child container gets a fresh context from
/// [`Context::field`] or [`Context::element`]; nothing is shared mutably
/// between levels.
#[derive(Clone)]
pub(crate) struct Context<'a> {
    pub(crate) resolver: &'a PathResolver,
    pub(crate) backend: &'a dyn Backend,
    pub(crate) base: PathBuf,
    pub(crate) coding_path: CodingPath,
}

impl<'a> Context<'a> {
    pub(crate) fn root(resolver: &'a PathResolver, backend: &'a dyn Backend, base: &Path) -> Self {
        Self {
            resolver,
            backend,
            base: base.to_path_buf(),
            coding_path: CodingPath::root(),
        }
    }

    /// The context for field `name` under this one.
    pub(crate) fn field(&self, name: &str) -> Self {
        Self {
            resolver: self.resolver,
            backend: self.backend,
            base: self.resolver.child_path(&self.base, name),
            coding_path: self.coding_path.child(CodingKey::Field(name.to_string())),
        }
    }

    /// The context for element `index`, stored under entry name `name`.
    pub(crate) fn element(&self, index: usize, name: &str) -> Self {
        Self {
            resolver: self.resolver,
            backend: self.backend,
            base: self.resolver.child_path(&self.base, name),
            coding_path: self.coding_path.child(CodingKey::Index(index)),
        }
    }

    /// The leaf file a scalar at this context lives in.
    pub(crate) fn leaf_file(&self) -> PathBuf {
        self.resolver.leaf_file(&self.base)
    }

    /// Whether any value is stored at this context.
    pub(crate) fn has_value(&self) -> bool {
        self.resolver.exists_as_value(&self.base, self.backend)
    }
}
