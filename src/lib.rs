//! # qcstore: Schema-governed storage for typed scientific records
//!
//! A hierarchical store of *records*: labelled, tag-stamped bundles of scalar
//! attributes and dense numeric arrays. The shape of the hierarchy is
//! declared up front by a [`Schema`], and every write is checked against it.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `StorageBackend` is the contract between the record
//!    layer and the hierarchical storage engine
//! 2. **Clean DTOs**: `TypeTag`, `Record`, `AttributeSet`, `Array` are plain
//!    data until written
//! 3. **Parser owns nothing**: schema text → tree is a pure function
//! 4. **One writer**: a `Container` owns its backend handle exclusively
//!
//! ## Quick Start
//!
//! ```rust
//! use qcstore::{Container, Record, Schema, TypeTag};
//!
//! # fn example() -> qcstore::Result<()> {
//! let schema = Schema::deserialize("Base [ Molecule [ Geometry Property ] ]")?;
//! let mut store = Container::open_memory(schema)?;
//! store.add_group("/Water", TypeTag::Molecule)?;
//!
//! let mut energy = Record::property("energy");
//! energy.set_attribute("theory", "b3lyp");
//! energy.set_attribute("value", -76.4);
//! store.write("/Water", &energy)?;
//!
//! let mut back = Record::default();
//! store.read("/Water/energy", &mut back)?;
//! assert_eq!(back.get_attribute::<f64>("value"), Some(-76.4));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Storage Backends
//!
//! | Backend | Description |
//! |---------|-------------|
//! | Memory | In-memory target for testing/embedding |
//! | File | Whole tree persisted as one JSON document |

// ============================================================================
// Modules
// ============================================================================

pub mod container;
pub mod export;
pub mod model;
pub mod path;
pub mod schema;
pub mod storage;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    AnyArray, Array, Attribute, AttributeSet, Element, Record, ScalarKind, TypeTag,
};

// ============================================================================
// Re-exports: Schema, Container, Storage
// ============================================================================

pub use schema::{NodeRef, Schema};

pub use container::{Container, ContainerConfig, Diagnostics, OpenMode, Status};

pub use storage::{BackendConfig, FileBackend, MemoryBackend, StorageBackend};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Type mismatch at {path}: expected {expected}, found {found}")]
    TypeMismatch { path: String, expected: TypeTag, found: TypeTag },

    #[error("Schema violation: {tag} may not be placed at {path}")]
    SchemaViolation { path: String, tag: TypeTag },

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Unsupported array shape: {0}")]
    UnsupportedShape(String),

    #[error("Schema mismatch: expected `{expected}`, found `{found}`")]
    SchemaMismatch { expected: String, found: String },

    #[error("Schema syntax error at position {position}: {message}")]
    SyntaxError { position: usize, message: String },

    #[error("opening in {0} mode requires a schema")]
    SchemaRequired(OpenMode),

    #[error("container is not open (status: {0})")]
    NotOpen(Status),

    #[error("{failed} of {total} items failed in {what}")]
    PartialFailure { what: String, failed: usize, total: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
