//! Single-file storage backend.
//!
//! The whole node tree is held in memory while attached and persisted as one
//! JSON document. Writes go to a sibling temp file that is then renamed over
//! the target, so a crash mid-flush leaves the previous version intact.
//!
//! ## Limitations
//!
//! - Non-finite floats are stored as the strings `"NaN"`, `"inf"` and
//!   `"-inf"`, so the file is not plain numeric JSON.
//! - The file is rewritten in full on every flush.
//! - Datasets whose extents do not match their buffer fail the whole load.

use std::fs;
use std::path::{Path, PathBuf};

use super::tree::NodeTree;
use super::{AttributeValue, Dataset, NodeKind, StorageBackend};
use crate::{Error, Result};

/// JSON-document storage at a filesystem path.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    tree: Option<NodeTree>,
    dirty: bool,
}

impl FileBackend {
    /// A detached handle for `path`. Nothing is touched on disk until
    /// `create` or `load`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), tree: None, dirty: false }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether unflushed changes are pending.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn tree(&self) -> Result<&NodeTree> {
        self.tree.as_ref().ok_or_else(|| self.detached())
    }

    fn tree_mut(&mut self) -> Result<&mut NodeTree> {
        if self.tree.is_none() {
            return Err(self.detached());
        }
        self.dirty = true;
        self.tree.as_mut().ok_or_else(|| Error::StorageError("detached".into()))
    }

    fn detached(&self) -> Error {
        Error::StorageError(format!("{} is not open", self.path.display()))
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StorageBackend for FileBackend {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn target_exists(&self) -> bool {
        self.path.is_file()
    }

    fn create(&mut self) -> Result<()> {
        self.tree = Some(NodeTree::new());
        self.dirty = true;
        self.flush()
    }

    fn load(&mut self) -> Result<()> {
        let text = fs::read_to_string(&self.path).map_err(|e| {
            Error::StorageError(format!("cannot read {}: {e}", self.path.display()))
        })?;
        let tree: NodeTree = serde_json::from_str(&text).map_err(|e| {
            Error::StorageError(format!("{} is not a qcstore file: {e}", self.path.display()))
        })?;
        self.tree = Some(tree);
        self.dirty = false;
        tracing::debug!(path = %self.path.display(), "loaded store file");
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let Some(tree) = self.tree.as_ref() else {
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }
        let bytes = serde_json::to_vec(tree).map_err(|e| {
            Error::StorageError(format!("cannot encode {}: {e}", self.path.display()))
        })?;
        let temp = self.temp_path();
        fs::write(&temp, bytes)?;
        fs::rename(&temp, &self.path)?;
        self.dirty = false;
        tracing::debug!(path = %self.path.display(), "flushed store file");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let flushed = self.flush();
        self.tree = None;
        self.dirty = false;
        flushed
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    fn node_kind(&self, path: &str) -> Option<NodeKind> {
        self.tree.as_ref().and_then(|tree| tree.kind(path))
    }

    fn create_group(&mut self, path: &str) -> Result<()> {
        self.tree_mut()?.create_group(path)
    }

    fn children(&self, path: &str) -> Result<Vec<(String, NodeKind)>> {
        self.tree()?.children(path)
    }

    fn remove(&mut self, path: &str) -> Result<()> {
        self.tree_mut()?.remove(path)
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    fn set_attribute(&mut self, path: &str, name: &str, value: AttributeValue) -> Result<()> {
        self.tree_mut()?.set_attribute(path, name, value)
    }

    fn attribute(&self, path: &str, name: &str) -> Result<Option<AttributeValue>> {
        self.tree()?.attribute(path, name)
    }

    fn attributes(&self, path: &str) -> Result<Vec<(String, AttributeValue)>> {
        self.tree()?.attributes(path)
    }

    // ========================================================================
    // Datasets
    // ========================================================================

    fn write_dataset(&mut self, path: &str, dataset: Dataset) -> Result<()> {
        self.tree_mut()?.write_dataset(path, dataset)
    }

    fn read_dataset(&self, path: &str) -> Result<Dataset> {
        self.tree()?.read_dataset(path)
    }
}
