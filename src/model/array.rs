//! Dense, rank-fixed numeric arrays and their tagged-variant wrapper.
//!
//! An [`Array<T, R>`] stores its elements in one linear buffer in column-major
//! order: the first index varies fastest. Offsets are computed from
//! per-dimension multipliers,
//!
//! ```text
//! multiplier[0] = 1
//! multiplier[d] = multiplier[d-1] * extent[d-1]
//! offset(index) = Σ index[d] * multiplier[d]
//! ```
//!
//! so an array of extents `(4, 6)` places `(i, j)` at `i + 4*j`.
//!
//! Records hold arrays of differing rank and element type side by side as
//! [`AnyArray`], an enum keyed by `(rank, scalar kind)`.
//!
//! ```rust
//! use qcstore::model::Array;
//!
//! let mut a = Array::<f64, 2>::new([4, 6]);
//! a.zero();
//! a[[3, 4]] = 3.1415;
//! assert_eq!(a.offset([3, 4]), 19);
//! assert_eq!(a.as_slice()[19], 3.1415);
//! ```

use std::fmt;
use std::ops::{Index, IndexMut};

use crate::storage::{Dataset, DatasetBuffer, ElementType};
use crate::{Error, Result};

// ============================================================================
// Element types
// ============================================================================

/// Scalar kinds an array may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Int,
    Double,
}

impl ScalarKind {
    /// The backing-store element type this kind is persisted as.
    pub fn element_type(self) -> ElementType {
        match self {
            ScalarKind::Int => ElementType::Int32,
            ScalarKind::Double => ElementType::Float64,
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScalarKind::Int => "int",
            ScalarKind::Double => "double",
        })
    }
}

/// An element type usable in an [`Array`].
pub trait Element: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    const KIND: ScalarKind;

    /// The element whose value is the given linear offset.
    fn from_offset(offset: usize) -> Self;
}

impl Element for i32 {
    const KIND: ScalarKind = ScalarKind::Int;

    fn from_offset(offset: usize) -> Self {
        offset as i32
    }
}

impl Element for f64 {
    const KIND: ScalarKind = ScalarKind::Double;

    fn from_offset(offset: usize) -> Self {
        offset as f64
    }
}

// ============================================================================
// Array
// ============================================================================

/// Dense array of rank `R` over element type `T`, column-major.
///
/// The buffer is exclusively owned; `Clone` duplicates it.
#[derive(Clone, PartialEq)]
pub struct Array<T: Element, const R: usize> {
    data: Vec<T>,
    size: [usize; R],
    multipliers: [usize; R],
}

impl<T: Element, const R: usize> Array<T, R> {
    /// Allocate an array of the given extents. Contents start zeroed but
    /// callers should not rely on that; use [`zero`](Self::zero).
    pub fn new(size: [usize; R]) -> Self {
        let mut array = Self { data: Vec::new(), size, multipliers: [0; R] };
        array.resize(size);
        array
    }

    /// Build an array around an existing column-major buffer.
    pub fn from_vec(size: [usize; R], data: Vec<T>) -> Result<Self> {
        let mut array = Self { data: Vec::new(), size, multipliers: [0; R] };
        let length = array.recompute(size).ok_or_else(|| {
            Error::UnsupportedShape(format!("extents {size:?} overflow the address space"))
        })?;
        if length != data.len() {
            return Err(Error::UnsupportedShape(format!(
                "buffer of {} elements does not fit extents {:?}",
                data.len(),
                size
            )));
        }
        array.data = data;
        Ok(array)
    }

    /// Change the extents. Multipliers and length are recomputed; the buffer
    /// is reallocated only when the total length changes, and its contents
    /// are unspecified afterwards either way.
    ///
    /// # Panics
    ///
    /// If the product of the extents overflows `usize`.
    pub fn resize(&mut self, size: [usize; R]) {
        let Some(length) = self.recompute(size) else {
            panic!("extents {size:?} overflow the address space");
        };
        if self.data.len() != length {
            self.data = vec![T::default(); length];
        }
    }

    /// Set extents and multipliers; `None` if the element count overflows.
    fn recompute(&mut self, size: [usize; R]) -> Option<usize> {
        self.size = size;
        let mut n = 1usize;
        for d in 0..R {
            self.multipliers[d] = n;
            n = n.checked_mul(size[d])?;
        }
        Some(n)
    }

    /// Set every element to zero.
    pub fn zero(&mut self) {
        self.data.fill(T::default());
    }

    /// Set every element to its own linear offset. Handy when checking
    /// addressing by eye.
    pub fn fill_sequential(&mut self) {
        for (i, v) in self.data.iter_mut().enumerate() {
            *v = T::from_offset(i);
        }
    }

    /// Linear offset of `index`. Not bounds-checked.
    pub fn offset(&self, index: [usize; R]) -> usize {
        index
            .iter()
            .zip(self.multipliers.iter())
            .map(|(i, m)| i * m)
            .sum()
    }

    fn in_bounds(&self, index: &[usize; R]) -> bool {
        index.iter().zip(self.size.iter()).all(|(i, n)| i < n)
    }

    pub fn get(&self, index: [usize; R]) -> Option<&T> {
        if self.in_bounds(&index) {
            self.data.get(self.offset(index))
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, index: [usize; R]) -> Option<&mut T> {
        if self.in_bounds(&index) {
            let offset = self.offset(index);
            self.data.get_mut(offset)
        } else {
            None
        }
    }

    pub const fn rank(&self) -> usize {
        R
    }

    pub fn dims(&self) -> &[usize; R] {
        &self.size
    }

    /// Extent of dimension `n`, or 0 when `n` is not below the rank.
    pub fn dim(&self, n: usize) -> usize {
        self.size.get(n).copied().unwrap_or(0)
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }
}

impl<T: Element, const R: usize> Index<[usize; R]> for Array<T, R> {
    type Output = T;

    fn index(&self, index: [usize; R]) -> &T {
        match self.get(index) {
            Some(v) => v,
            None => panic!("index {index:?} out of bounds for extents {:?}", self.size),
        }
    }
}

impl<T: Element, const R: usize> IndexMut<[usize; R]> for Array<T, R> {
    fn index_mut(&mut self, index: [usize; R]) -> &mut T {
        let size = self.size;
        match self.get_mut(index) {
            Some(v) => v,
            None => panic!("index {index:?} out of bounds for extents {size:?}"),
        }
    }
}

impl<T: Element, const R: usize> fmt::Debug for Array<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("kind", &T::KIND)
            .field("size", &self.size)
            .field("data", &self.data)
            .finish()
    }
}

// ============================================================================
// AnyArray: the tagged variant
// ============================================================================

/// An array of any supported `(rank, scalar kind)` combination.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyArray {
    Int1(Array<i32, 1>),
    Int2(Array<i32, 2>),
    Int3(Array<i32, 3>),
    Double1(Array<f64, 1>),
    Double2(Array<f64, 2>),
    Double3(Array<f64, 3>),
}

macro_rules! dispatch {
    ($value:expr, $a:ident => $body:expr) => {
        match $value {
            AnyArray::Int1($a) => $body,
            AnyArray::Int2($a) => $body,
            AnyArray::Int3($a) => $body,
            AnyArray::Double1($a) => $body,
            AnyArray::Double2($a) => $body,
            AnyArray::Double3($a) => $body,
        }
    };
}

impl AnyArray {
    pub fn rank(&self) -> usize {
        dispatch!(self, a => a.rank())
    }

    pub fn kind(&self) -> ScalarKind {
        match self {
            AnyArray::Int1(_) | AnyArray::Int2(_) | AnyArray::Int3(_) => ScalarKind::Int,
            AnyArray::Double1(_) | AnyArray::Double2(_) | AnyArray::Double3(_) => ScalarKind::Double,
        }
    }

    pub fn dims(&self) -> &[usize] {
        dispatch!(self, a => &a.dims()[..])
    }

    pub fn len(&self) -> usize {
        dispatch!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy into a backing-store dataset.
    pub fn to_dataset(&self) -> Result<Dataset> {
        let buffer = match self {
            AnyArray::Int1(a) => DatasetBuffer::Int32(a.as_slice().to_vec()),
            AnyArray::Int2(a) => DatasetBuffer::Int32(a.as_slice().to_vec()),
            AnyArray::Int3(a) => DatasetBuffer::Int32(a.as_slice().to_vec()),
            AnyArray::Double1(a) => DatasetBuffer::Float64(a.as_slice().to_vec()),
            AnyArray::Double2(a) => DatasetBuffer::Float64(a.as_slice().to_vec()),
            AnyArray::Double3(a) => DatasetBuffer::Float64(a.as_slice().to_vec()),
        };
        Dataset::new(self.dims(), buffer)
    }

    /// Rebuild from a backing-store dataset.
    ///
    /// Only rank 1-3 with i32 or f64 elements are supported; anything else is
    /// `Error::UnsupportedShape`.
    pub fn from_dataset(dataset: Dataset) -> Result<Self> {
        let rank = dataset.rank();
        let e = dataset.extents().to_vec();
        match (dataset.into_data(), rank) {
            (DatasetBuffer::Int32(v), 1) => Ok(AnyArray::Int1(Array::from_vec([e[0]], v)?)),
            (DatasetBuffer::Int32(v), 2) => Ok(AnyArray::Int2(Array::from_vec([e[0], e[1]], v)?)),
            (DatasetBuffer::Int32(v), 3) => Ok(AnyArray::Int3(Array::from_vec([e[0], e[1], e[2]], v)?)),
            (DatasetBuffer::Float64(v), 1) => Ok(AnyArray::Double1(Array::from_vec([e[0]], v)?)),
            (DatasetBuffer::Float64(v), 2) => Ok(AnyArray::Double2(Array::from_vec([e[0], e[1]], v)?)),
            (DatasetBuffer::Float64(v), 3) => Ok(AnyArray::Double3(Array::from_vec([e[0], e[1], e[2]], v)?)),
            (buffer, rank) => Err(Error::UnsupportedShape(format!(
                "rank {rank} {} arrays are not supported",
                buffer.element_type()
            ))),
        }
    }
}

/// Concrete array types that have an [`AnyArray`] variant.
pub trait ArrayVariant: Sized {
    fn into_any(self) -> AnyArray;
    fn from_any(any: &AnyArray) -> Option<&Self>;
    fn from_any_mut(any: &mut AnyArray) -> Option<&mut Self>;
}

macro_rules! array_variant {
    ($($variant:ident => $t:ty, $r:literal;)*) => {
        $(
            impl ArrayVariant for Array<$t, $r> {
                fn into_any(self) -> AnyArray {
                    AnyArray::$variant(self)
                }

                fn from_any(any: &AnyArray) -> Option<&Self> {
                    match any {
                        AnyArray::$variant(a) => Some(a),
                        _ => None,
                    }
                }

                fn from_any_mut(any: &mut AnyArray) -> Option<&mut Self> {
                    match any {
                        AnyArray::$variant(a) => Some(a),
                        _ => None,
                    }
                }
            }

            impl From<Array<$t, $r>> for AnyArray {
                fn from(a: Array<$t, $r>) -> Self {
                    AnyArray::$variant(a)
                }
            }
        )*
    };
}

array_variant! {
    Int1 => i32, 1;
    Int2 => i32, 2;
    Int3 => i32, 3;
    Double1 => f64, 1;
    Double2 => f64, 2;
    Double3 => f64, 3;
}
