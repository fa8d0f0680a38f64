//! AttributeSet: the typed scalar attributes carried by a record.

use std::fmt;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::storage::{AttributeValue, StorageBackend};
use crate::{Error, Result};

/// One attribute value of one of the four record-level kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Attribute {
    Int(i32),
    UInt(u32),
    Double(f64),
    String(String),
}

impl Attribute {
    pub fn type_name(&self) -> &'static str {
        match self {
            Attribute::Int(_) => "int",
            Attribute::UInt(_) => "unsigned",
            Attribute::Double(_) => "double",
            Attribute::String(_) => "string",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Int(v) => write!(f, "{v}"),
            Attribute::UInt(v) => write!(f, "{v}"),
            Attribute::Double(v) => write!(f, "{v}"),
            Attribute::String(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
        }
    }
}

// ============================================================================
// Conversions (From impls)
// ============================================================================

impl From<i32> for Attribute { fn from(v: i32) -> Self { Attribute::Int(v) } }
impl From<u32> for Attribute { fn from(v: u32) -> Self { Attribute::UInt(v) } }
impl From<f64> for Attribute { fn from(v: f64) -> Self { Attribute::Double(v) } }
impl From<String> for Attribute { fn from(v: String) -> Self { Attribute::String(v) } }
impl From<&str> for Attribute { fn from(v: &str) -> Self { Attribute::String(v.to_owned()) } }

impl From<Attribute> for AttributeValue {
    fn from(attr: Attribute) -> Self {
        match attr {
            Attribute::Int(v) => AttributeValue::Int(v),
            Attribute::UInt(v) => AttributeValue::UInt(v),
            Attribute::Double(v) => AttributeValue::Double(v),
            Attribute::String(s) => AttributeValue::String(s),
        }
    }
}

impl TryFrom<AttributeValue> for Attribute {
    type Error = AttributeValue;

    /// Fails (handing the value back) for backing kinds records don't map.
    fn try_from(value: AttributeValue) -> std::result::Result<Self, AttributeValue> {
        match value {
            AttributeValue::Int(v) => Ok(Attribute::Int(v)),
            AttributeValue::UInt(v) => Ok(Attribute::UInt(v)),
            AttributeValue::Double(v) => Ok(Attribute::Double(v)),
            AttributeValue::String(s) => Ok(Attribute::String(s)),
            other => Err(other),
        }
    }
}

/// Scalar types that can be fetched back out of an [`AttributeSet`].
pub trait AttributeScalar: Sized {
    #[doc(hidden)]
    fn lookup(set: &AttributeSet, name: &str) -> Option<Self>;
    #[doc(hidden)]
    fn take(set: &mut AttributeSet, name: &str) -> Option<Self>;
}

macro_rules! attribute_scalar {
    ($($ty:ty => $map:ident),* $(,)?) => {
        $(
            impl AttributeScalar for $ty {
                fn lookup(set: &AttributeSet, name: &str) -> Option<Self> {
                    set.$map.get(name).cloned()
                }

                fn take(set: &mut AttributeSet, name: &str) -> Option<Self> {
                    set.$map.remove(name)
                }
            }
        )*
    };
}

attribute_scalar! {
    i32 => ints,
    u32 => uints,
    f64 => doubles,
    String => strings,
}

// ============================================================================
// AttributeSet
// ============================================================================

/// Four independent name-to-value maps, one per scalar kind.
///
/// Keys are unique within a map, not across maps: `"x"` may exist both as an
/// int and as a string. When such a set is written to a backing node the
/// kinds are pushed in the order int, unsigned, double, string, so the later
/// kind is the one that survives on the node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSet {
    ints: HashMap<String, i32>,
    uints: HashMap<String, u32>,
    doubles: HashMap<String, f64>,
    strings: HashMap<String, String>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `name` in the map matching the value's kind.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Attribute>) {
        let name = name.into();
        match value.into() {
            Attribute::Int(v) => { self.ints.insert(name, v); }
            Attribute::UInt(v) => { self.uints.insert(name, v); }
            Attribute::Double(v) => { self.doubles.insert(name, v); }
            Attribute::String(v) => { self.strings.insert(name, v); }
        }
    }

    /// Value of `name` in the `T` map, if present there.
    pub fn get<T: AttributeScalar>(&self, name: &str) -> Option<T> {
        T::lookup(self, name)
    }

    /// Remove `name` from the `T` map and return its value.
    pub fn take<T: AttributeScalar>(&mut self, name: &str) -> Option<T> {
        T::take(self, name)
    }

    /// Remove `name` from every map. Returns true if anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let mut removed = self.ints.remove(name).is_some();
        removed |= self.uints.remove(name).is_some();
        removed |= self.doubles.remove(name).is_some();
        removed |= self.strings.remove(name).is_some();
        removed
    }

    /// Total number of entries across all four maps.
    pub fn len(&self) -> usize {
        self.ints.len() + self.uints.len() + self.doubles.len() + self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.ints.clear();
        self.uints.clear();
        self.doubles.clear();
        self.strings.clear();
    }

    /// Every entry, kinds in write order (int, unsigned, double, string).
    pub fn iter(&self) -> impl Iterator<Item = (&str, Attribute)> + '_ {
        let ints = self.ints.iter().map(|(k, v)| (k.as_str(), Attribute::Int(*v)));
        let uints = self.uints.iter().map(|(k, v)| (k.as_str(), Attribute::UInt(*v)));
        let doubles = self.doubles.iter().map(|(k, v)| (k.as_str(), Attribute::Double(*v)));
        let strings = self.strings.iter().map(|(k, v)| (k.as_str(), Attribute::String(v.clone())));
        ints.chain(uints).chain(doubles).chain(strings)
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Push every entry onto the group at `path`.
    ///
    /// Failures are logged per entry and reported together; a failing entry
    /// does not stop the remaining ones from being written.
    pub fn write<B: StorageBackend + ?Sized>(&self, store: &mut B, path: &str) -> Result<()> {
        self.write_filtered(store, path, |_| true)
    }

    /// [`write`](Self::write), except that entries whose name `keep`
    /// rejects are counted as failures and left off the node.
    pub fn write_filtered<B, F>(&self, store: &mut B, path: &str, keep: F) -> Result<()>
    where
        B: StorageBackend + ?Sized,
        F: Fn(&str) -> bool,
    {
        let mut failed = 0usize;
        let mut total = 0usize;
        for (name, value) in self.iter() {
            total += 1;
            if !keep(name) {
                tracing::warn!(path, name, "attribute name is reserved; not written");
                failed += 1;
                continue;
            }
            tracing::debug!(path, name, %value, "writing attribute");
            if let Err(e) = store.set_attribute(path, name, value.into()) {
                tracing::warn!(path, name, error = %e, "attribute write failed");
                failed += 1;
            }
        }
        if failed > 0 {
            return Err(Error::PartialFailure {
                what: format!("attributes on {path}"),
                failed,
                total,
            });
        }
        Ok(())
    }

    /// Repopulate from every attribute present on the group at `path`.
    ///
    /// Entries already in the set are kept unless overwritten. Attributes of
    /// a backing kind with no record-level counterpart are skipped with a
    /// warning.
    pub fn read<B: StorageBackend + ?Sized>(&mut self, store: &B, path: &str) -> Result<()> {
        let found = store.attributes(path)?;
        tracing::debug!(path, count = found.len(), "reading attributes");
        for (name, value) in found {
            match Attribute::try_from(value) {
                Ok(attr) => self.set(name, attr),
                Err(other) => {
                    tracing::warn!(
                        path,
                        name = name.as_str(),
                        kind = other.type_name(),
                        "skipping attribute of unrecognised type"
                    );
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;

    #[test]
    fn test_set_and_get_by_kind() {
        let mut attrs = AttributeSet::new();
        attrs.set("n", 5);
        attrs.set("charge", 0u32);
        attrs.set("energy", 3.1415);
        attrs.set("theory", "b3lyp");

        assert_eq!(attrs.get::<i32>("n"), Some(5));
        assert_eq!(attrs.get::<u32>("charge"), Some(0));
        assert_eq!(attrs.get::<f64>("energy"), Some(3.1415));
        assert_eq!(attrs.get::<String>("theory"), Some("b3lyp".to_string()));
        assert_eq!(attrs.len(), 4);
    }

    #[test]
    fn test_get_looks_only_in_matching_map() {
        let mut attrs = AttributeSet::new();
        attrs.set("n", 5);
        assert_eq!(attrs.get::<f64>("n"), None);
        assert_eq!(attrs.get::<String>("n"), None);
        assert_eq!(attrs.get::<i32>("missing"), None);
    }

    #[test]
    fn test_set_overwrites() {
        let mut attrs = AttributeSet::new();
        attrs.set("T1", 50);
        attrs.set("T1", 3);
        assert_eq!(attrs.get::<i32>("T1"), Some(3));
        assert_eq!(attrs.len(), 1);
    }

    #[test]
    fn test_same_name_across_kinds_coexists() {
        let mut attrs = AttributeSet::new();
        attrs.set("x", 1);
        attrs.set("x", "one");
        assert_eq!(attrs.get::<i32>("x"), Some(1));
        assert_eq!(attrs.get::<String>("x"), Some("one".into()));
        assert_eq!(attrs.len(), 2);
        assert!(attrs.remove("x"));
        assert!(attrs.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut attrs = AttributeSet::new();
        attrs.set("a", 1);
        attrs.set("b", 2.0);
        attrs.clear();
        assert!(attrs.is_empty());
    }

    #[test]
    fn test_take() {
        let mut attrs = AttributeSet::new();
        attrs.set("DataType", 4u32);
        assert_eq!(attrs.take::<u32>("DataType"), Some(4));
        assert_eq!(attrs.take::<u32>("DataType"), None);
    }

    #[test]
    fn test_write_then_read() {
        let mut store = MemoryBackend::new();
        store.create().unwrap();
        store.create_group("/g").unwrap();

        let mut attrs = AttributeSet::new();
        attrs.set("n", -7);
        attrs.set("count", 7u32);
        attrs.set("pi", 3.1415);
        attrs.set("theory", "b3lyp");
        attrs.write(&mut store, "/g").unwrap();

        let mut back = AttributeSet::new();
        back.read(&store, "/g").unwrap();
        assert_eq!(back, attrs);
    }

    #[test]
    fn test_cross_kind_name_later_kind_wins_on_node() {
        let mut store = MemoryBackend::new();
        store.create().unwrap();

        let mut attrs = AttributeSet::new();
        attrs.set("x", 1);
        attrs.set("x", "one");
        attrs.write(&mut store, "/").unwrap();

        assert_eq!(
            store.attribute("/", "x").unwrap(),
            Some(AttributeValue::String("one".into()))
        );
    }

    #[test]
    fn test_read_skips_unrecognised_kinds() {
        let mut store = MemoryBackend::new();
        store.create().unwrap();
        store.set_attribute("/", "big", AttributeValue::Long(1 << 40)).unwrap();
        store.set_attribute("/", "single", AttributeValue::Float(1.5)).unwrap();
        store.set_attribute("/", "ok", AttributeValue::Int(1)).unwrap();

        let mut attrs = AttributeSet::new();
        attrs.read(&store, "/").unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.get::<i32>("ok"), Some(1));
    }

    #[test]
    fn test_write_to_missing_node_aggregates_failures() {
        let mut store = MemoryBackend::new();
        store.create().unwrap();

        let mut attrs = AttributeSet::new();
        attrs.set("a", 1);
        attrs.set("b", 2.0);

        match attrs.write(&mut store, "/absent") {
            Err(Error::PartialFailure { failed, total, .. }) => {
                assert_eq!(failed, 2);
                assert_eq!(total, 2);
            }
            other => panic!("expected PartialFailure, got {other:?}"),
        }
    }
}
