//! Shared-tree wrapper for concurrent readers
//!
//! A built [`Tree`] is read-only apart from attestation appends, so the
//! lock here guards exactly that one mutable surface: queries take the
//! read lock, [`SharedTree::add_attestation`] the write lock. Construction
//! stays single-writer in [`TreeBuilder`](crate::TreeBuilder); only
//! finished trees are shared.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::MerkleError;
use crate::path::PathStep;
use crate::tree::{Attestation, Tree};

/// Cheaply cloneable handle to a tree shared across threads
#[derive(Debug, Clone)]
pub struct SharedTree {
    inner: Arc<RwLock<Tree>>,
}

impl SharedTree {
    pub fn new(tree: Tree) -> Self {
        Self {
            inner: Arc::new(RwLock::new(tree)),
        }
    }

    /// Root digest, hex encoded
    pub fn root(&self) -> String {
        self.inner.read().root().to_string()
    }

    /// Recompute the root from the leaf layer and compare with `expected`
    pub fn verify(&self, expected: &str) -> bool {
        self.inner.read().verify(expected)
    }

    /// Extract the inclusion path for one leaf
    pub fn path(&self, needle: &str) -> Result<Vec<PathStep>, MerkleError> {
        self.inner.read().path(needle)
    }

    /// Append an opaque attestation record under the write lock
    pub fn add_attestation(&self, record: impl Into<Attestation>) {
        self.inner.write().add_attestation(record);
    }

    pub fn attestation_count(&self) -> usize {
        self.inner.read().proofs().len()
    }

    /// Clone the current tree state out of the lock
    pub fn snapshot(&self) -> Tree {
        self.inner.read().clone()
    }

    /// Run a closure against the tree under the read lock
    pub fn with_tree<R>(&self, f: impl FnOnce(&Tree) -> R) -> R {
        f(&self.inner.read())
    }
}

impl From<Tree> for SharedTree {
    fn from(tree: Tree) -> Self {
        Self::new(tree)
    }
}
