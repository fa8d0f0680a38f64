//! # Container
//!
//! The schema-governed store. A `Container` owns one backend handle and the
//! active [`Schema`], and checks every write against it.
//!
//! ```text
//! Closed ──open──▶ Open ──close──▶ Closed
//!    │
//!    └──failed open──▶ Error   (terminal)
//! ```
//!
//! Fallible operations return `Result` and also keep the error's text as
//! [`Container::last_error`]. Operations on a container that is not open fail
//! with `Error::NotOpen`.
//!
//! ```rust
//! use qcstore::{Container, Record, Schema, TypeTag};
//!
//! let mut schema = Schema::new(TypeTag::Base);
//! let molecule = schema.append_child(schema.root(), TypeTag::Molecule);
//! schema.append_child(molecule, TypeTag::Geometry);
//!
//! let mut store = Container::open_memory(schema)?;
//! store.add_group("/Ethanol", TypeTag::Molecule)?;
//!
//! let mut geom = Record::geometry("initial");
//! geom.create_array_2d::<f64>(3, 9).zero();
//! store.write("/Ethanol", &geom)?;
//!
//! let mut back = Record::geometry("");
//! store.read("/Ethanol/initial", &mut back)?;
//! assert_eq!(back, geom);
//! # Ok::<(), qcstore::Error>(())
//! ```

pub mod config;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::model::{Record, TypeTag, TAG_ATTRIBUTE};
use crate::path;
use crate::schema::Schema;
use crate::storage::{AttributeValue, BackendConfig, FileBackend, MemoryBackend, StorageBackend};
use crate::{Error, Result};

pub use config::{ContainerConfig, Diagnostics};

/// Name of the root string attribute holding the schema text.
pub const SCHEMA_ATTRIBUTE: &str = "Schema";

// ============================================================================
// Open modes and status
// ============================================================================

/// How [`Container::open`] treats the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    /// Create a target that must not exist yet. Needs a schema.
    New,
    /// Attach to an existing target and read its schema back.
    Old,
    /// Create the target, truncating anything already there. Needs a schema.
    Overwrite,
}

impl OpenMode {
    /// Case-insensitive `new`, `old` or `overwrite`.
    pub fn parse(s: &str) -> Option<Self> {
        [OpenMode::New, OpenMode::Old, OpenMode::Overwrite]
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s.trim()))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OpenMode::New => "new",
            OpenMode::Old => "old",
            OpenMode::Overwrite => "overwrite",
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Closed,
    Open,
    /// A failed open. The instance cannot be reopened.
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Closed => "closed",
            Status::Open => "open",
            Status::Error => "error",
        })
    }
}

// ============================================================================
// Container
// ============================================================================

/// A schema-governed store on top of a [`StorageBackend`].
pub struct Container<B: StorageBackend> {
    backend: B,
    schema: Option<Schema>,
    status: Status,
    last_error: Option<String>,
    config: ContainerConfig,
}

impl<B: StorageBackend> Container<B> {
    /// A closed container around `backend`.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, ContainerConfig::default())
    }

    pub fn with_config(backend: B, config: ContainerConfig) -> Self {
        Self { backend, schema: None, status: Status::Closed, last_error: None, config }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status == Status::Open
    }

    /// Text of the most recent failure, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The active schema while open.
    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    /// Access the underlying backend (for advanced use).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Open the target in `mode`.
    ///
    /// `New` and `Overwrite` persist `schema` and stamp the root with the
    /// schema root's tag. `Old` reads the stored schema back and, when
    /// `schema` is also given, requires the two to be structurally equal.
    /// Any failure leaves the container in [`Status::Error`].
    pub fn open(&mut self, mode: OpenMode, schema: Option<Schema>) -> Result<()> {
        let result = scoped(self.config.diagnostics, || self.try_open(mode, schema));
        self.outcome("open", path::ROOT, result)
    }

    fn try_open(&mut self, mode: OpenMode, schema: Option<Schema>) -> Result<()> {
        match self.status {
            Status::Error => return Err(Error::NotOpen(Status::Error)),
            Status::Open => self.close()?,
            Status::Closed => {}
        }

        match self.attach(mode, schema) {
            Ok(schema) => {
                self.schema = Some(schema);
                self.status = Status::Open;
                if self.config.diagnostics.verbose() {
                    tracing::debug!(target_name = %self.backend.describe(), %mode, "container opened");
                }
                Ok(())
            }
            Err(e) => {
                if let Err(close_err) = self.backend.close() {
                    tracing::debug!(error = %close_err, "releasing backend after failed open");
                }
                self.schema = None;
                self.status = Status::Error;
                Err(e)
            }
        }
    }

    fn attach(&mut self, mode: OpenMode, schema: Option<Schema>) -> Result<Schema> {
        match mode {
            OpenMode::New => {
                let schema = schema.ok_or(Error::SchemaRequired(mode))?;
                if self.backend.target_exists() {
                    return Err(Error::AlreadyExists(self.backend.describe()));
                }
                self.backend.create()?;
                self.install(&schema)?;
                Ok(schema)
            }
            OpenMode::Overwrite => {
                let schema = schema.ok_or(Error::SchemaRequired(mode))?;
                self.backend.create()?;
                self.install(&schema)?;
                Ok(schema)
            }
            OpenMode::Old => {
                if !self.backend.target_exists() {
                    return Err(Error::StorageError(format!(
                        "{} does not exist",
                        self.backend.describe()
                    )));
                }
                self.backend.load()?;
                let stored = match self.backend.attribute(path::ROOT, SCHEMA_ATTRIBUTE)? {
                    Some(AttributeValue::String(text)) => Schema::deserialize(&text)?,
                    Some(other) => {
                        return Err(Error::NotFound(format!(
                            "schema attribute on / holds {} instead of a string",
                            other.type_name()
                        )));
                    }
                    None => return Err(Error::NotFound("schema attribute on /".into())),
                };
                if let Some(given) = schema {
                    if given != stored {
                        return Err(Error::SchemaMismatch {
                            expected: given.serialize(),
                            found: stored.serialize(),
                        });
                    }
                }
                Ok(stored)
            }
        }
    }

    fn install(&mut self, schema: &Schema) -> Result<()> {
        let root_tag = schema.tag(schema.root());
        self.backend
            .set_attribute(path::ROOT, TAG_ATTRIBUTE, AttributeValue::UInt(root_tag.id()))?;
        self.backend
            .set_attribute(path::ROOT, SCHEMA_ATTRIBUTE, AttributeValue::String(schema.serialize()))?;
        self.backend.flush()
    }

    /// Flush pending writes to the target.
    pub fn flush(&mut self) -> Result<()> {
        let result = scoped(self.config.diagnostics, || {
            self.ensure_open().and_then(|_| self.backend.flush())
        });
        self.outcome("flush", path::ROOT, result)
    }

    /// Release the target. Closing a container that is not open does nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.status != Status::Open {
            return Ok(());
        }
        self.status = Status::Closed;
        self.schema = None;
        let result = scoped(self.config.diagnostics, || self.backend.close());
        self.outcome("close", path::ROOT, result)
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// Whether anything exists at `path`. False when not open.
    pub fn path_exists(&self, path: &str) -> bool {
        self.is_open() && self.backend.exists(path)
    }

    /// Tag persisted on the group at `path`; `Invalid` when not open, when
    /// nothing is there, or when the node carries no tag.
    pub fn type_at(&self, path: &str) -> TypeTag {
        if !self.is_open() {
            return TypeTag::Invalid;
        }
        match self.backend.attribute(path, TAG_ATTRIBUTE) {
            Ok(Some(AttributeValue::UInt(id))) => TypeTag::from_id(id),
            _ => TypeTag::Invalid,
        }
    }

    fn path_valid(&self, path: &str, tag: TypeTag) -> bool {
        match &self.schema {
            Some(schema) => schema.is_path_valid(path, tag, |prefix| self.type_at(prefix)),
            None => false,
        }
    }

    /// Whether `record` may be written under `path` right now.
    pub fn can_write(&self, path: &str, record: &Record) -> bool {
        self.is_open() && self.path_valid(path, record.tag())
    }

    // ========================================================================
    // Groups and records
    // ========================================================================

    /// Create a typed group at `path`.
    ///
    /// An existing group with the same tag is accepted as is; one with a
    /// different tag is a `TypeMismatch`.
    pub fn add_group(&mut self, path: &str, tag: TypeTag) -> Result<()> {
        let result = scoped(self.config.diagnostics, || self.try_add_group(path, tag));
        self.outcome("add_group", path, result)
    }

    fn try_add_group(&mut self, path: &str, tag: TypeTag) -> Result<()> {
        self.ensure_open()?;
        if self.backend.exists(path) {
            let found = self.type_at(path);
            if found == tag {
                return Ok(());
            }
            return Err(Error::TypeMismatch { path: path::normalize(path), expected: tag, found });
        }
        if !self.path_valid(&path::parent(path), tag) {
            return Err(Error::SchemaViolation { path: path::normalize(path), tag });
        }
        self.backend.create_group(path)?;
        self.backend.set_attribute(path, TAG_ATTRIBUTE, AttributeValue::UInt(tag.id()))
    }

    /// Write `record` as `path/<label>` after checking the schema allows its
    /// tag under `path`. Nothing is written when the check fails, or when the
    /// label is empty or contains `/`.
    pub fn write(&mut self, path: &str, record: &Record) -> Result<()> {
        let result = scoped(self.config.diagnostics, || self.try_write(path, record));
        self.outcome("write", path, result)
    }

    fn try_write(&mut self, path: &str, record: &Record) -> Result<()> {
        self.ensure_open()?;
        path::check_name(record.label())?;
        let target = path::join(path, record.label());
        if !self.path_valid(path, record.tag()) {
            return Err(Error::SchemaViolation { path: target, tag: record.tag() });
        }
        if self.backend.exists(&target) {
            let found = self.type_at(&target);
            if found != record.tag() {
                return Err(Error::TypeMismatch { path: target, expected: record.tag(), found });
            }
        }
        record.write(&mut self.backend, path)
    }

    /// Read the record stored at `path` into `record`.
    ///
    /// The record's label becomes the last component of `path`; the root
    /// itself is not a record. A record
    /// with the unset tag accepts whatever is stored; otherwise the stored
    /// tag must match.
    pub fn read(&mut self, path: &str, record: &mut Record) -> Result<()> {
        let result = scoped(self.config.diagnostics, || self.try_read(path, record));
        self.outcome("read", path, result)
    }

    fn try_read(&self, path: &str, record: &mut Record) -> Result<()> {
        self.ensure_open()?;
        if path::is_root(path) {
            return Err(Error::InvalidName("the container root is not a record".into()));
        }
        if !self.backend.exists(path) {
            return Err(Error::NotFound(path::normalize(path)));
        }
        let found = self.type_at(path);
        if !record.tag().is_unset() && found != record.tag() {
            return Err(Error::TypeMismatch { path: path::normalize(path), expected: record.tag(), found });
        }
        record.set_label(path::leaf(path));
        record.read(&self.backend, &path::parent(path))
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(Error::NotOpen(self.status))
        }
    }

    /// Report and remember the result of a public operation.
    fn outcome<T>(&mut self, op: &'static str, path: &str, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => {
                if self.config.diagnostics.verbose() {
                    tracing::debug!(op, path, "container operation succeeded");
                }
            }
            Err(e) => {
                if self.config.diagnostics.warnings() {
                    tracing::warn!(op, path, target_name = %self.backend.describe(), error = %e, "container operation failed");
                }
                self.last_error = Some(e.to_string());
            }
        }
        result
    }
}

/// Run one container operation. Under [`Diagnostics::Silent`] every event
/// it raises, including those from records, attributes and the backend, is
/// dropped instead of reaching the current subscriber.
fn scoped<T>(diagnostics: Diagnostics, op: impl FnOnce() -> T) -> T {
    if diagnostics == Diagnostics::Silent {
        tracing::subscriber::with_default(tracing::subscriber::NoSubscriber::default(), op)
    } else {
        op()
    }
}

impl<B: StorageBackend> fmt::Debug for Container<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("target", &self.backend.describe())
            .field("status", &self.status)
            .field("schema", &self.schema.as_ref().map(Schema::serialize))
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl<B: StorageBackend> Drop for Container<B> {
    fn drop(&mut self) {
        // A failure here has already been reported by close().
        let _ = self.close();
    }
}

// ============================================================================
// Convenience constructors
// ============================================================================

/// In-memory store for testing and embedding.
impl Container<MemoryBackend> {
    /// A new container on a fresh in-memory target.
    pub fn open_memory(schema: Schema) -> Result<Self> {
        let mut container = Self::new(MemoryBackend::new());
        container.open(OpenMode::New, Some(schema))?;
        Ok(container)
    }
}

impl Container<FileBackend> {
    pub fn open_file(path: impl Into<PathBuf>, mode: OpenMode, schema: Option<Schema>) -> Result<Self> {
        let mut container = Self::new(FileBackend::new(path));
        container.open(mode, schema)?;
        Ok(container)
    }
}

impl Container<Box<dyn StorageBackend>> {
    /// A closed container on whatever backend `backend` describes.
    pub fn connect(backend: &BackendConfig, config: ContainerConfig) -> Self {
        Self::with_config(backend.connect(), config)
    }
}
