//! # Storage Backend Trait
//!
//! This is THE contract between qcstore and the hierarchical storage engine
//! underneath it. The container, record and attribute layers only ever talk
//! to a backing store through [`StorageBackend`].
//!
//! ## Implementations
//!
//! | Backend | Module | Description |
//! |---------|--------|-------------|
//! | `MemoryBackend` | `memory` | In-memory target for testing/embedding |
//! | `FileBackend` | `file` | Whole tree persisted as one JSON document |
//!
//! ## Data model
//!
//! Groups are addressed by slash-separated paths rooted at `/` and carry named
//! scalar or string attributes. Datasets are leaf nodes holding one dense,
//! homogeneously typed buffer plus its extents. Children are enumerated in
//! insertion order.

pub mod file;
mod float;
pub mod memory;
mod tree;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{Error, Result};

pub use file::FileBackend;
pub use memory::MemoryBackend;

// ============================================================================
// Backend Configuration
// ============================================================================

/// Configuration for connecting to a storage backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// In-memory (no persistence beyond the process)
    Memory,

    /// Single JSON document on the local filesystem
    File { path: PathBuf },
}

impl BackendConfig {
    /// Build a detached backend handle for this configuration.
    pub fn connect(&self) -> Box<dyn StorageBackend> {
        match self {
            BackendConfig::Memory => Box::new(MemoryBackend::new()),
            BackendConfig::File { path } => Box::new(FileBackend::new(path.clone())),
        }
    }
}

// ============================================================================
// Node kinds
// ============================================================================

/// What lives at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Group,
    Dataset,
}

// ============================================================================
// Attributes
// ============================================================================

/// A scalar or string attribute as the backing store holds it.
///
/// The store knows more kinds than the record layer maps (`Long`, `Float`);
/// readers skip what they do not understand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum AttributeValue {
    Int(i32),
    UInt(u32),
    Long(i64),
    Float(#[serde(with = "float::scalar")] f32),
    Double(#[serde(with = "float::scalar")] f64),
    String(String),
}

impl AttributeValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::Int(_) => "i32",
            AttributeValue::UInt(_) => "u32",
            AttributeValue::Long(_) => "i64",
            AttributeValue::Float(_) => "f32",
            AttributeValue::Double(_) => "f64",
            AttributeValue::String(_) => "string",
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Int(v) => write!(f, "{v}"),
            AttributeValue::UInt(v) => write!(f, "{v}"),
            AttributeValue::Long(v) => write!(f, "{v}"),
            AttributeValue::Float(v) => write!(f, "{v}"),
            AttributeValue::Double(v) => write!(f, "{v}"),
            AttributeValue::String(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
        }
    }
}

// ============================================================================
// Datasets
// ============================================================================

/// Element type of a dataset buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    Int32,
    Int64,
    Float32,
    Float64,
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ElementType::Int32 => "i32",
            ElementType::Int64 => "i64",
            ElementType::Float32 => "f32",
            ElementType::Float64 => "f64",
        })
    }
}

/// Linear dataset contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values")]
pub enum DatasetBuffer {
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float32(#[serde(with = "float::seq")] Vec<f32>),
    Float64(#[serde(with = "float::seq")] Vec<f64>),
}

impl DatasetBuffer {
    pub fn element_type(&self) -> ElementType {
        match self {
            DatasetBuffer::Int32(_) => ElementType::Int32,
            DatasetBuffer::Int64(_) => ElementType::Int64,
            DatasetBuffer::Float32(_) => ElementType::Float32,
            DatasetBuffer::Float64(_) => ElementType::Float64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            DatasetBuffer::Int32(v) => v.len(),
            DatasetBuffer::Int64(v) => v.len(),
            DatasetBuffer::Float32(v) => v.len(),
            DatasetBuffer::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Extents of a dataset, slowest-varying last (column-major).
pub type Extents = SmallVec<[usize; 4]>;

/// A dense dataset: extents plus one linear buffer.
///
/// Invariant: the product of `extents` equals the buffer length. The check
/// also runs when a dataset is deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDataset")]
pub struct Dataset {
    extents: Extents,
    data: DatasetBuffer,
}

#[derive(Deserialize)]
struct RawDataset {
    extents: Extents,
    data: DatasetBuffer,
}

impl TryFrom<RawDataset> for Dataset {
    type Error = Error;

    fn try_from(raw: RawDataset) -> Result<Self> {
        Dataset::new(&raw.extents, raw.data)
    }
}

/// Product of `extents`, or `None` if it overflows `usize`.
pub fn element_count(extents: &[usize]) -> Option<usize> {
    extents.iter().try_fold(1usize, |n, &e| n.checked_mul(e))
}

impl Dataset {
    pub fn new(extents: &[usize], data: DatasetBuffer) -> Result<Self> {
        let extents = Extents::from_slice(extents);
        if extents.is_empty() || element_count(&extents) != Some(data.len()) {
            return Err(Error::StorageError(format!(
                "dataset extents {:?} do not match buffer length {}",
                extents.as_slice(),
                data.len()
            )));
        }
        Ok(Self { extents, data })
    }

    pub fn rank(&self) -> usize {
        self.extents.len()
    }

    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    pub fn data(&self) -> &DatasetBuffer {
        &self.data
    }

    pub fn into_data(self) -> DatasetBuffer {
        self.data
    }

    pub fn info(&self) -> DatasetInfo {
        DatasetInfo {
            extents: self.extents.clone(),
            element_type: self.data.element_type(),
        }
    }
}

/// Shape and element type of a dataset, without its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetInfo {
    pub extents: Extents,
    pub element_type: ElementType,
}

impl DatasetInfo {
    pub fn rank(&self) -> usize {
        self.extents.len()
    }
}

// ============================================================================
// StorageBackend Trait
// ============================================================================

/// The backing-store contract.
///
/// A backend is a handle to a *target* (a file, an in-memory store). It is
/// detached until [`create`](StorageBackend::create) or
/// [`load`](StorageBackend::load) succeeds; node operations on a detached
/// backend fail with `Error::StorageError`. Paths are normalised by the
/// backend, so callers may pass trailing slashes.
pub trait StorageBackend: Send {
    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Human-readable name of the target, for diagnostics.
    fn describe(&self) -> String;

    /// Whether the target already exists.
    fn target_exists(&self) -> bool;

    /// (Re)create the target with an empty root group, truncating any
    /// previous contents, and attach to it.
    fn create(&mut self) -> Result<()>;

    /// Attach to an existing target.
    fn load(&mut self) -> Result<()>;

    /// Push pending writes to the target.
    fn flush(&mut self) -> Result<()>;

    /// Flush and detach. The handle may be loaded again afterwards.
    fn close(&mut self) -> Result<()>;

    // ========================================================================
    // Nodes
    // ========================================================================

    /// Kind of the node at `path`, or `None` if nothing is there.
    fn node_kind(&self, path: &str) -> Option<NodeKind>;

    /// Whether anything exists at `path`.
    fn exists(&self, path: &str) -> bool {
        self.node_kind(path).is_some()
    }

    /// Create a group. The parent must exist and be a group; the path must
    /// be free.
    fn create_group(&mut self, path: &str) -> Result<()>;

    /// Open the group at `path`, creating it if it is absent.
    fn open_or_create_group(&mut self, path: &str) -> Result<()> {
        match self.node_kind(path) {
            Some(NodeKind::Group) => Ok(()),
            Some(NodeKind::Dataset) => Err(Error::StorageError(format!(
                "{path} is a dataset, not a group"
            ))),
            None => self.create_group(path),
        }
    }

    /// Direct children of the group at `path`, in insertion order.
    fn children(&self, path: &str) -> Result<Vec<(String, NodeKind)>>;

    /// Remove the node at `path` and everything below it.
    fn remove(&mut self, path: &str) -> Result<()>;

    // ========================================================================
    // Attributes
    // ========================================================================

    /// Set (or replace) attribute `name` on the group at `path`.
    fn set_attribute(&mut self, path: &str, name: &str, value: AttributeValue) -> Result<()>;

    /// Attribute `name` on the group at `path`, if present.
    fn attribute(&self, path: &str, name: &str) -> Result<Option<AttributeValue>>;

    /// Every attribute on the group at `path`, in insertion order.
    fn attributes(&self, path: &str) -> Result<Vec<(String, AttributeValue)>>;

    // ========================================================================
    // Datasets
    // ========================================================================

    /// Create or replace the dataset at `path`. The parent must be a group.
    fn write_dataset(&mut self, path: &str, dataset: Dataset) -> Result<()>;

    /// Read the dataset at `path`.
    fn read_dataset(&self, path: &str) -> Result<Dataset>;

    /// Shape and element type of the dataset at `path`.
    ///
    /// Default: reads the whole dataset. Backends with cheap metadata should
    /// override.
    fn dataset_info(&self, path: &str) -> Result<DatasetInfo> {
        Ok(self.read_dataset(path)?.info())
    }
}

impl<B: StorageBackend + ?Sized> StorageBackend for Box<B> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn target_exists(&self) -> bool {
        (**self).target_exists()
    }

    fn create(&mut self) -> Result<()> {
        (**self).create()
    }

    fn load(&mut self) -> Result<()> {
        (**self).load()
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn node_kind(&self, path: &str) -> Option<NodeKind> {
        (**self).node_kind(path)
    }

    fn exists(&self, path: &str) -> bool {
        (**self).exists(path)
    }

    fn create_group(&mut self, path: &str) -> Result<()> {
        (**self).create_group(path)
    }

    fn open_or_create_group(&mut self, path: &str) -> Result<()> {
        (**self).open_or_create_group(path)
    }

    fn children(&self, path: &str) -> Result<Vec<(String, NodeKind)>> {
        (**self).children(path)
    }

    fn remove(&mut self, path: &str) -> Result<()> {
        (**self).remove(path)
    }

    fn set_attribute(&mut self, path: &str, name: &str, value: AttributeValue) -> Result<()> {
        (**self).set_attribute(path, name, value)
    }

    fn attribute(&self, path: &str, name: &str) -> Result<Option<AttributeValue>> {
        (**self).attribute(path, name)
    }

    fn attributes(&self, path: &str) -> Result<Vec<(String, AttributeValue)>> {
        (**self).attributes(path)
    }

    fn write_dataset(&mut self, path: &str, dataset: Dataset) -> Result<()> {
        (**self).write_dataset(path, dataset)
    }

    fn read_dataset(&self, path: &str) -> Result<Dataset> {
        (**self).read_dataset(path)
    }

    fn dataset_info(&self, path: &str) -> Result<DatasetInfo> {
        (**self).dataset_info(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_shape_must_match_buffer() {
        assert!(Dataset::new(&[2, 3], DatasetBuffer::Int32(vec![0; 6])).is_ok());
        assert!(Dataset::new(&[2, 3], DatasetBuffer::Int32(vec![0; 5])).is_err());
        assert!(Dataset::new(&[], DatasetBuffer::Float64(vec![])).is_err());
        assert!(Dataset::new(&[usize::MAX, 2], DatasetBuffer::Int32(vec![])).is_err());
    }

    #[test]
    fn test_deserialized_dataset_is_checked() {
        let ok = r#"{"extents":[2],"data":{"type":"Int32","values":[1,2]}}"#;
        assert!(serde_json::from_str::<Dataset>(ok).is_ok());

        let short = r#"{"extents":[3],"data":{"type":"Int32","values":[1,2]}}"#;
        assert!(serde_json::from_str::<Dataset>(short).is_err());

        let huge = r#"{"extents":[4294967296,4294967296],"data":{"type":"Int32","values":[]}}"#;
        assert!(serde_json::from_str::<Dataset>(huge).is_err());
    }

    #[test]
    fn test_non_finite_values_survive_json() {
        let ds = Dataset::new(&[3], DatasetBuffer::Float64(vec![f64::NAN, f64::INFINITY, -1.0]))
            .unwrap();
        let back: Dataset = serde_json::from_str(&serde_json::to_string(&ds).unwrap()).unwrap();
        match back.data() {
            DatasetBuffer::Float64(v) => {
                assert!(v[0].is_nan());
                assert_eq!(&v[1..], &[f64::INFINITY, -1.0]);
            }
            other => panic!("expected Float64, got {other:?}"),
        }

        let attr = AttributeValue::Double(f64::NEG_INFINITY);
        let text = serde_json::to_string(&attr).unwrap();
        assert_eq!(text, r#"{"type":"Double","value":"-inf"}"#);
        assert_eq!(serde_json::from_str::<AttributeValue>(&text).unwrap(), attr);
    }

    #[test]
    fn test_dataset_info() {
        let ds = Dataset::new(&[4, 6], DatasetBuffer::Float64(vec![0.0; 24])).unwrap();
        let info = ds.info();
        assert_eq!(info.rank(), 2);
        assert_eq!(info.extents.as_slice(), &[4, 6]);
        assert_eq!(info.element_type, ElementType::Float64);
    }

    #[test]
    fn test_backend_config_from_json() {
        let cfg: BackendConfig =
            serde_json::from_str(r#"{"kind": "file", "path": "/tmp/a.qcs"}"#).unwrap();
        assert_eq!(cfg, BackendConfig::File { path: PathBuf::from("/tmp/a.qcs") });

        let cfg: BackendConfig = serde_json::from_str(r#"{"kind": "memory"}"#).unwrap();
        assert_eq!(cfg, BackendConfig::Memory);
    }

    #[test]
    fn test_boxed_backend_delegates() {
        let mut backend = BackendConfig::Memory.connect();
        assert!(!backend.target_exists());
        backend.create().unwrap();
        backend.create_group("/a").unwrap();
        assert_eq!(backend.node_kind("/a"), Some(NodeKind::Group));
    }
}
