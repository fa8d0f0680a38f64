//! # Record Model
//!
//! The values that cross the container boundary: type tags, scalar
//! attribute sets, typed arrays and the records that bundle them.
//!
//! Only [`Record`] and [`AttributeSet`] touch a backend, and only through
//! `StorageBackend`; everything else here is pure data.

pub mod array;
pub mod attributes;
pub mod record;
pub mod type_tag;

pub use array::{AnyArray, Array, ArrayVariant, Element, ScalarKind};
pub use attributes::{Attribute, AttributeScalar, AttributeSet};
pub use record::{Record, TAG_ATTRIBUTE};
pub use type_tag::TypeTag;
