//! Record: a labelled, tag-stamped bundle of attributes and typed arrays.
//!
//! A record serializes to one group named after its label:
//!
//! ```text
//! <parent>/<label>          group, attribute DataType = tag id (u32)
//!                           plus one attribute per AttributeSet entry
//! <parent>/<label>/0        dataset for arrays[0]
//! <parent>/<label>/1        dataset for arrays[1]
//! ```

use super::array::{AnyArray, Array, ArrayVariant, Element};
use super::attributes::{Attribute, AttributeScalar, AttributeSet};
use super::type_tag::TypeTag;
use crate::path;
use crate::storage::{AttributeValue, NodeKind, StorageBackend};
use crate::{Error, Result};

/// Name of the unsigned attribute holding a node's tag id.
pub const TAG_ATTRIBUTE: &str = "DataType";

/// A named, typed aggregate of scalar attributes and arrays.
///
/// `Clone` is deep: the copy owns new buffers with the same shapes and
/// contents.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    label: String,
    tag: TypeTag,
    attributes: AttributeSet,
    arrays: Vec<AnyArray>,
}

impl Default for Record {
    fn default() -> Self {
        Self::new("Untitled", TypeTag::Base)
    }
}

impl Record {
    pub fn new(label: impl Into<String>, tag: TypeTag) -> Self {
        Self {
            label: label.into(),
            tag,
            attributes: AttributeSet::new(),
            arrays: Vec::new(),
        }
    }

    pub fn molecule(label: impl Into<String>) -> Self {
        Self::new(label, TypeTag::Molecule)
    }

    /// A geometry record; coordinates are in Bohr unless relabelled.
    pub fn geometry(label: impl Into<String>) -> Self {
        let mut record = Self::new(label, TypeTag::Geometry);
        record.set_attribute("units", "Bohr");
        record
    }

    pub fn calculation(label: impl Into<String>) -> Self {
        Self::new(label, TypeTag::Calculation)
    }

    pub fn property(label: impl Into<String>) -> Self {
        Self::new(label, TypeTag::Property)
    }

    // ========================================================================
    // Identity
    // ========================================================================

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<Attribute>) {
        self.attributes.set(name, value);
    }

    pub fn get_attribute<T: AttributeScalar>(&self, name: &str) -> Option<T> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut AttributeSet {
        &mut self.attributes
    }

    // ========================================================================
    // Arrays
    // ========================================================================

    /// Append a new array of the given extents and hand it back for filling.
    /// It is stored at the next index.
    pub fn create_array<T, const R: usize>(&mut self, size: [usize; R]) -> &mut Array<T, R>
    where
        T: Element,
        Array<T, R>: ArrayVariant,
    {
        self.arrays.push(Array::<T, R>::new(size).into_any());
        let last = self.arrays.last_mut().expect("array was just pushed");
        Array::<T, R>::from_any_mut(last).expect("pushed variant matches its own type")
    }

    pub fn create_array_1d<T>(&mut self, n: usize) -> &mut Array<T, 1>
    where
        T: Element,
        Array<T, 1>: ArrayVariant,
    {
        self.create_array([n])
    }

    pub fn create_array_2d<T>(&mut self, n0: usize, n1: usize) -> &mut Array<T, 2>
    where
        T: Element,
        Array<T, 2>: ArrayVariant,
    {
        self.create_array([n0, n1])
    }

    pub fn create_array_3d<T>(&mut self, n0: usize, n1: usize, n2: usize) -> &mut Array<T, 3>
    where
        T: Element,
        Array<T, 3>: ArrayVariant,
    {
        self.create_array([n0, n1, n2])
    }

    /// Append an already-built array.
    pub fn push_array(&mut self, array: impl Into<AnyArray>) {
        self.arrays.push(array.into());
    }

    pub fn array(&self, index: usize) -> Option<&AnyArray> {
        self.arrays.get(index)
    }

    /// Array `index`, if it exists and has type `Array<T, R>`.
    pub fn array_as<T, const R: usize>(&self, index: usize) -> Option<&Array<T, R>>
    where
        T: Element,
        Array<T, R>: ArrayVariant,
    {
        self.arrays.get(index).and_then(Array::<T, R>::from_any)
    }

    pub fn array_as_mut<T, const R: usize>(&mut self, index: usize) -> Option<&mut Array<T, R>>
    where
        T: Element,
        Array<T, R>: ArrayVariant,
    {
        self.arrays.get_mut(index).and_then(Array::<T, R>::from_any_mut)
    }

    pub fn arrays(&self) -> &[AnyArray] {
        &self.arrays
    }

    /// Number of arrays.
    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Write this record as the group `parent/label`, creating it if needed.
    /// The label must be a single non-empty path component.
    ///
    /// Datasets left over from an earlier version of the record are removed
    /// first. The `DataType` attribute name is reserved for the tag; a user
    /// entry under that name is not written and counts as a failure.
    /// Per-attribute and per-array failures are logged and reported
    /// together as `Error::PartialFailure`; remaining items are still written.
    pub fn write<B: StorageBackend + ?Sized>(&self, store: &mut B, parent: &str) -> Result<()> {
        path::check_name(&self.label)?;
        let node = path::join(parent, &self.label);
        tracing::debug!(path = %node, tag = %self.tag, arrays = self.arrays.len(), "writing record");

        store.open_or_create_group(&node)?;

        for (name, kind) in store.children(&node)? {
            if kind == NodeKind::Dataset {
                store.remove(&path::join(&node, &name))?;
            }
        }

        let mut failed = 0usize;
        let mut total = 0usize;

        match self.attributes.write_filtered(store, &node, |name| name != TAG_ATTRIBUTE) {
            Ok(()) => total += self.attributes.len(),
            Err(Error::PartialFailure { failed: f, total: t, .. }) => {
                failed += f;
                total += t;
            }
            Err(e) => return Err(e),
        }
        store.set_attribute(&node, TAG_ATTRIBUTE, AttributeValue::UInt(self.tag.id()))?;

        for (index, array) in self.arrays.iter().enumerate() {
            total += 1;
            let target = path::join(&node, &index.to_string());
            let written = array
                .to_dataset()
                .and_then(|dataset| store.write_dataset(&target, dataset));
            if let Err(e) = written {
                tracing::warn!(path = %target, error = %e, "array write failed");
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(Error::PartialFailure { what: format!("record {node}"), failed, total });
        }
        Ok(())
    }

    /// Replace this record's contents with the group `parent/label`.
    ///
    /// A record carrying the unset tag adopts the stored one; any other tag
    /// must match it. Sub-groups are skipped. Datasets are read in numeric
    /// order of their names; one that cannot be represented is counted as a
    /// failure without stopping the rest.
    pub fn read<B: StorageBackend + ?Sized>(&mut self, store: &B, parent: &str) -> Result<()> {
        path::check_name(&self.label)?;
        let node = path::join(parent, &self.label);
        self.arrays.clear();
        self.attributes.clear();

        self.attributes.read(store, &node)?;
        let stored = self
            .attributes
            .take::<u32>(TAG_ATTRIBUTE)
            .map_or(TypeTag::Base, TypeTag::from_id);

        if self.tag.is_unset() {
            self.tag = stored;
        } else if stored != self.tag {
            return Err(Error::TypeMismatch { path: node, expected: self.tag, found: stored });
        }

        let mut datasets = Vec::new();
        for (name, kind) in store.children(&node)? {
            match kind {
                NodeKind::Dataset => datasets.push(name),
                NodeKind::Group => {
                    tracing::warn!(path = %node, child = name.as_str(), "skipping sub-group inside record");
                }
            }
        }
        datasets.sort_by_cached_key(|name| {
            let numeric = name.parse::<usize>().ok();
            (numeric.is_none(), numeric.unwrap_or(0), name.clone())
        });

        let total = datasets.len();
        let mut failed = 0usize;
        for name in datasets {
            let source = path::join(&node, &name);
            match store.read_dataset(&source).and_then(AnyArray::from_dataset) {
                Ok(array) => self.arrays.push(array),
                Err(e) => {
                    tracing::warn!(path = %source, error = %e, "array read failed");
                    failed += 1;
                }
            }
        }

        tracing::debug!(path = %node, tag = %self.tag, arrays = self.arrays.len(), "read record");
        if failed > 0 {
            return Err(Error::PartialFailure { what: format!("record {node}"), failed, total });
        }
        Ok(())
    }
}
