//! Input/output descriptors and per-point value buffers.
//!
//! Every value flowing through a Function graph is an [`IoBuffer`]: a small,
//! fixed-width run of numbers tagged with
//!
//! - an [`IoKind`] describing its logical shape (scalar, vector, tensor, ...),
//! - a [`DataType`] describing how the numbers are to be read (bool, int, double).
//!
//! Values are always stored as `f64`. Booleans are stored as `0.0`/`1.0` and
//! integers as exactly representable whole numbers, which keeps every operator
//! implementation to a single numeric code path. An `Int` value therefore never
//! exceeds [`MAX_EXACT_INT`] in magnitude.

use smallvec::SmallVec;

/// Largest integer magnitude an `f64` holds exactly (2^53).
pub const MAX_EXACT_INT: i64 = 1 << 53;

/// Returns true when `value` can be stored as an `Int` without rounding.
pub fn is_exact_int(value: i64) -> bool {
    value.unsigned_abs() <= MAX_EXACT_INT.unsigned_abs()
}

/// Returns true when a whole-number `f64` still lies in the exact integer range.
pub(crate) fn fits_exact_int(value: f64) -> bool {
    value.abs() <= MAX_EXACT_INT as f64
}

/// Logical shape of a Function input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoKind {
    Scalar,
    Vector,
    SymmetricTensor,
    Tensor,
    Array,
}

impl IoKind {
    /// Returns true when an input row of `width` values may be declared as this kind.
    ///
    /// Vectors and tensors are only defined for 2D and 3D problems:
    /// - Scalar: 1
    /// - Vector: 2 or 3
    /// - SymmetricTensor: 3 or 6
    /// - Tensor: 4 or 9
    /// - Array: any positive width
    pub fn accepts_width(&self, width: usize) -> bool {
        match self {
            IoKind::Scalar => width == 1,
            IoKind::Vector => matches!(width, 2 | 3),
            IoKind::SymmetricTensor => matches!(width, 3 | 6),
            IoKind::Tensor => matches!(width, 4 | 9),
            IoKind::Array => width > 0,
        }
    }

    /// Human readable list of the widths this kind accepts, used in error messages.
    pub fn expected_widths(&self) -> &'static str {
        match self {
            IoKind::Scalar => "1",
            IoKind::Vector => "2 or 3",
            IoKind::SymmetricTensor => "3 or 6",
            IoKind::Tensor => "4 or 9",
            IoKind::Array => "any positive size",
        }
    }
}

impl std::fmt::Display for IoKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IoKind::Scalar => "Scalar",
            IoKind::Vector => "Vector",
            IoKind::SymmetricTensor => "SymmetricTensor",
            IoKind::Tensor => "Tensor",
            IoKind::Array => "Array",
        };
        write!(f, "{name}")
    }
}

/// Element type of a value buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Bool,
    Int,
    Double,
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        !matches!(self, DataType::Bool)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DataType::Bool => "bool",
            DataType::Int => "int",
            DataType::Double => "double",
        };
        write!(f, "{name}")
    }
}

/// Shape tag attached to a Function output: a kind plus its logical width.
///
/// The width is fixed when the descriptor is created and is never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IoDescriptor {
    kind: IoKind,
    width: usize,
}

impl IoDescriptor {
    /// Creates a descriptor, returning `None` for a zero width.
    pub fn new(kind: IoKind, width: usize) -> Option<Self> {
        (width > 0).then_some(Self { kind, width })
    }

    pub fn scalar() -> Self {
        Self {
            kind: IoKind::Scalar,
            width: 1,
        }
    }

    /// Descriptor for a composed vector of `width` components. A zero width is clamped to one.
    pub fn vector(width: usize) -> Self {
        Self {
            kind: IoKind::Vector,
            width: width.max(1),
        }
    }

    pub fn kind(&self) -> IoKind {
        self.kind
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_scalar(&self) -> bool {
        self.width == 1
    }
}

impl std::fmt::Display for IoDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.kind, self.width)
    }
}

/// Inline storage for one point's worth of values. Nine slots cover a full 3D tensor.
pub type Values = SmallVec<[f64; 9]>;

/// The value produced by a Function at a single evaluation point.
#[derive(Debug, Clone, PartialEq)]
pub struct IoBuffer {
    descriptor: IoDescriptor,
    dtype: DataType,
    values: Values,
}

impl IoBuffer {
    /// Builds a buffer from raw values; the descriptor width must match.
    ///
    /// # Panics
    /// Panics when `values.len()` differs from the descriptor width. Callers inside the
    /// crate always build both from the same source.
    pub(crate) fn new(descriptor: IoDescriptor, dtype: DataType, values: Values) -> Self {
        assert_eq!(descriptor.width(), values.len(), "buffer width mismatch");
        Self {
            descriptor,
            dtype,
            values,
        }
    }

    pub fn double(value: f64) -> Self {
        Self::new(IoDescriptor::scalar(), DataType::Double, smallvec::smallvec![value])
    }

    /// A scalar int. Every `i32` is exactly representable.
    pub fn int(value: i32) -> Self {
        Self::new(
            IoDescriptor::scalar(),
            DataType::Int,
            smallvec::smallvec![f64::from(value)],
        )
    }

    /// A scalar int, or `None` when `value` lies outside `±MAX_EXACT_INT`.
    pub fn try_int(value: i64) -> Option<Self> {
        is_exact_int(value).then(|| {
            Self::new(
                IoDescriptor::scalar(),
                DataType::Int,
                smallvec::smallvec![value as f64],
            )
        })
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(
            IoDescriptor::scalar(),
            DataType::Bool,
            smallvec::smallvec![bool_to_f64(value)],
        )
    }

    /// A buffer of doubles with the given kind. Returns `None` for an empty slice.
    pub fn from_slice(kind: IoKind, values: &[f64]) -> Option<Self> {
        let descriptor = IoDescriptor::new(kind, values.len())?;
        Some(Self::new(
            descriptor,
            DataType::Double,
            values.iter().copied().collect(),
        ))
    }

    pub fn descriptor(&self) -> IoDescriptor {
        self.descriptor
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn width(&self) -> usize {
        self.values.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn at(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    /// Reads a scalar boolean buffer. Returns `None` for wider or non-bool buffers.
    pub fn as_bool(&self) -> Option<bool> {
        match (self.dtype, self.values.as_slice()) {
            (DataType::Bool, [v]) => Some(*v != 0.0),
            _ => None,
        }
    }

    /// Reads a scalar integer-like buffer (int or bool). Returns `None` otherwise.
    pub fn as_int(&self) -> Option<i64> {
        match (self.dtype, self.values.as_slice()) {
            (DataType::Int | DataType::Bool, [v]) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn into_values(self) -> Values {
        self.values
    }
}

pub(crate) fn bool_to_f64(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_width() {
        assert!(IoKind::Scalar.accepts_width(1));
        assert!(!IoKind::Scalar.accepts_width(2));
        assert!(IoKind::Vector.accepts_width(2));
        assert!(IoKind::Vector.accepts_width(3));
        assert!(!IoKind::Vector.accepts_width(4));
        assert!(IoKind::SymmetricTensor.accepts_width(6));
        assert!(!IoKind::SymmetricTensor.accepts_width(4));
        assert!(IoKind::Tensor.accepts_width(9));
        assert!(!IoKind::Tensor.accepts_width(6));
        assert!(IoKind::Array.accepts_width(17));
    }

    #[test]
    fn test_descriptor_rejects_zero_width() {
        assert!(IoDescriptor::new(IoKind::Array, 0).is_none());
        let desc = IoDescriptor::new(IoKind::Tensor, 9).unwrap();
        assert_eq!(desc.width(), 9);
        assert_eq!(format!("{desc}"), "Tensor[9]");
    }

    #[test]
    fn test_buffer_accessors() {
        assert_eq!(IoBuffer::boolean(true).as_bool(), Some(true));
        assert_eq!(IoBuffer::double(1.0).as_bool(), None);
        assert_eq!(IoBuffer::int(4).as_int(), Some(4));
        assert_eq!(
            IoBuffer::try_int(-MAX_EXACT_INT).and_then(|b| b.as_int()),
            Some(-MAX_EXACT_INT)
        );
        assert!(IoBuffer::try_int(MAX_EXACT_INT + 1).is_none());
        assert!(IoBuffer::try_int(i64::MIN).is_none());
        assert_eq!(IoBuffer::double(4.0).as_int(), None);

        let vec = IoBuffer::from_slice(IoKind::Vector, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(vec.width(), 3);
        assert_eq!(vec.at(2), Some(3.0));
        assert_eq!(vec.at(3), None);
        assert!(IoBuffer::from_slice(IoKind::Vector, &[]).is_none());
    }
}
