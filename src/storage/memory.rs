//! In-memory storage backend.
//!
//! This is the reference implementation of `StorageBackend`.
//! It keeps one node tree behind an `Arc<RwLock>`.
//!
//! ## Limitations
//!
//! - **No persistence**: the target lives as long as some clone of the
//!   backend does. `flush()` and `close()` are no-ops for the data.
//! - **Single-writer only**: the lock protects the tree's memory, it does not
//!   make two containers writing the same target safe.
//!
//! Clones share the target, so a test can close one container and reopen the
//! same target in `Old` mode through another clone.
//!
//! Use this backend for:
//! - Testing schema validation and record round trips
//! - Embedding qcstore in applications that don't need persistence

use std::sync::Arc;

use parking_lot::RwLock;

use super::tree::NodeTree;
use super::{AttributeValue, Dataset, NodeKind, StorageBackend};
use crate::{Error, Result};

// ============================================================================
// MemoryBackend
// ============================================================================

/// In-memory hierarchical storage.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<RwLock<Option<NodeTree>>>,
}

impl MemoryBackend {
    /// A handle to a fresh target that does not exist yet.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_tree<T>(&self, f: impl FnOnce(&NodeTree) -> Result<T>) -> Result<T> {
        match self.inner.read().as_ref() {
            Some(tree) => f(tree),
            None => Err(Error::StorageError("in-memory target has not been created".into())),
        }
    }

    fn with_tree_mut<T>(&self, f: impl FnOnce(&mut NodeTree) -> Result<T>) -> Result<T> {
        match self.inner.write().as_mut() {
            Some(tree) => f(tree),
            None => Err(Error::StorageError("in-memory target has not been created".into())),
        }
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("exists", &self.inner.read().is_some())
            .finish()
    }
}

// ============================================================================
// StorageBackend impl
// ============================================================================

impl StorageBackend for MemoryBackend {
    fn describe(&self) -> String {
        format!("memory:{:p}", Arc::as_ptr(&self.inner))
    }

    fn target_exists(&self) -> bool {
        self.inner.read().is_some()
    }

    fn create(&mut self) -> Result<()> {
        *self.inner.write() = Some(NodeTree::new());
        Ok(())
    }

    fn load(&mut self) -> Result<()> {
        if self.target_exists() {
            Ok(())
        } else {
            Err(Error::StorageError(format!("{} does not exist", self.describe())))
        }
    }

    /// No-op: writes are applied to the shared tree immediately.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// No-op: the tree is the target and outlives the connection.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    fn node_kind(&self, path: &str) -> Option<NodeKind> {
        self.inner.read().as_ref().and_then(|tree| tree.kind(path))
    }

    fn create_group(&mut self, path: &str) -> Result<()> {
        self.with_tree_mut(|tree| tree.create_group(path))
    }

    fn children(&self, path: &str) -> Result<Vec<(String, NodeKind)>> {
        self.with_tree(|tree| tree.children(path))
    }

    fn remove(&mut self, path: &str) -> Result<()> {
        self.with_tree_mut(|tree| tree.remove(path))
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    fn set_attribute(&mut self, path: &str, name: &str, value: AttributeValue) -> Result<()> {
        self.with_tree_mut(|tree| tree.set_attribute(path, name, value))
    }

    fn attribute(&self, path: &str, name: &str) -> Result<Option<AttributeValue>> {
        self.with_tree(|tree| tree.attribute(path, name))
    }

    fn attributes(&self, path: &str) -> Result<Vec<(String, AttributeValue)>> {
        self.with_tree(|tree| tree.attributes(path))
    }

    // ========================================================================
    // Datasets
    // ========================================================================

    fn write_dataset(&mut self, path: &str, dataset: Dataset) -> Result<()> {
        self.with_tree_mut(|tree| tree.write_dataset(path, dataset))
    }

    fn read_dataset(&self, path: &str) -> Result<Dataset> {
        self.with_tree(|tree| tree.read_dataset(path))
    }
}
