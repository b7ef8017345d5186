//! Evaluation points and the `FunctionInput` capability.
//!
//! A [`FunctionInput`] is any external structure (mesh, particle swarm, index
//! set) able to hand out an ordered, finite and restartable sequence of
//! evaluation points. Each [`EvalPoint`] carries its coordinate and, optionally,
//! a [`PointContext`] identifying the item of the discretisation that produced
//! it, which data items such as [`crate::field::IndexedField`] need to resolve
//! per-item values.
//!
//! The engine only reads from a `FunctionInput`; ownership and synchronisation
//! stay with the provider.

use std::sync::Arc;

use ndarray::{Array2, ArrayView1};

use crate::errors::EvaluationError;
use crate::io::{DataType, IoBuffer, IoDescriptor, IoKind};

/// Discretisation context attached to a point produced by a `FunctionInput`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointContext {
    /// Index of the point within its provider (vertex, particle, ...)
    pub index: usize,
    /// Owning cell or element, when the provider knows it
    pub element: Option<usize>,
}

/// A single evaluation point.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalPoint {
    coord: IoBuffer,
    context: Option<PointContext>,
}

impl EvalPoint {
    pub fn new(coord: IoBuffer) -> Self {
        Self {
            coord,
            context: None,
        }
    }

    pub fn with_context(coord: IoBuffer, context: PointContext) -> Self {
        Self {
            coord,
            context: Some(context),
        }
    }

    pub fn coord(&self) -> &IoBuffer {
        &self.coord
    }

    pub fn context(&self) -> Option<PointContext> {
        self.context
    }
}

/// Capability implemented by structures that supply evaluation points.
///
/// Implementations must yield the same points in the same order on every call to
/// [`FunctionInput::points`], and `local_len` must equal the number of points yielded.
pub trait FunctionInput {
    /// Starts a fresh pass over the points.
    fn points(&self) -> Box<dyn Iterator<Item = EvalPoint> + '_>;

    /// Number of points held locally.
    fn local_len(&self) -> usize;
}

/// Kind assumed for undeclared raw input rows of `width` values.
pub(crate) fn default_kind(width: usize) -> IoKind {
    if width == 1 {
        IoKind::Scalar
    } else {
        IoKind::Array
    }
}

fn row_buffer(kind: IoKind, dtype: DataType, row: ArrayView1<'_, f64>) -> Option<IoBuffer> {
    let descriptor = IoDescriptor::new(kind, row.len())?;
    Some(IoBuffer::new(descriptor, dtype, row.iter().copied().collect()))
}

/// Rows of a coordinate array, each row one evaluation point.
#[derive(Debug, Clone)]
pub struct ArrayInput {
    coords: Array2<f64>,
    kind: IoKind,
    dtype: DataType,
}

impl ArrayInput {
    /// Wraps `coords`, declaring each row to be of `kind`.
    ///
    /// # Returns
    /// * `Ok(ArrayInput)` - Rows are consistent with `kind`
    /// * `Err(EvaluationError::DeclaredTypeMismatch)` - The row width is not valid for `kind`
    pub fn new(coords: Array2<f64>, kind: IoKind) -> Result<Self, EvaluationError> {
        Self::with_dtype(coords, kind, DataType::Double)
    }

    pub(crate) fn with_dtype(
        coords: Array2<f64>,
        kind: IoKind,
        dtype: DataType,
    ) -> Result<Self, EvaluationError> {
        let width = coords.ncols();
        if !kind.accepts_width(width) {
            return Err(EvaluationError::DeclaredTypeMismatch {
                kind,
                width,
                expected: kind.expected_widths(),
            });
        }
        Ok(Self {
            coords,
            kind,
            dtype,
        })
    }

    /// Rows without a declared kind: one column is a scalar, anything wider an array.
    pub fn undeclared(coords: Array2<f64>, dtype: DataType) -> Result<Self, EvaluationError> {
        let kind = default_kind(coords.ncols());
        Self::with_dtype(coords, kind, dtype)
    }

    /// The point for row `index`.
    pub fn point(&self, index: usize) -> Option<EvalPoint> {
        if index >= self.coords.nrows() {
            return None;
        }
        row_buffer(self.kind, self.dtype, self.coords.row(index)).map(EvalPoint::new)
    }
}

impl FunctionInput for ArrayInput {
    fn points(&self) -> Box<dyn Iterator<Item = EvalPoint> + '_> {
        Box::new(
            self.coords
                .rows()
                .into_iter()
                .filter_map(|row| row_buffer(self.kind, self.dtype, row))
                .map(EvalPoint::new),
        )
    }

    fn local_len(&self) -> usize {
        self.coords.nrows()
    }
}

/// A subset of the rows of a shared coordinate array.
///
/// Points carry their row number as [`PointContext::index`], so per-row data items
/// can be looked up directly.
#[derive(Debug, Clone)]
pub struct IndexSetInput {
    coords: Arc<Array2<f64>>,
    indices: Vec<usize>,
}

impl IndexSetInput {
    /// # Returns
    /// * `Err(EvaluationError::InputType)` - An index lies past the last row
    pub fn new(coords: Arc<Array2<f64>>, indices: Vec<usize>) -> Result<Self, EvaluationError> {
        let rows = coords.nrows();
        if let Some(bad) = indices.iter().find(|&&i| i >= rows) {
            return Err(EvaluationError::InputType(format!(
                "index {bad} is out of range for a coordinate array with {rows} rows"
            )));
        }
        Ok(Self { coords, indices })
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

impl FunctionInput for IndexSetInput {
    fn points(&self) -> Box<dyn Iterator<Item = EvalPoint> + '_> {
        let kind = default_kind(self.coords.ncols());
        Box::new(self.indices.iter().filter_map(move |&index| {
            let coord = row_buffer(kind, DataType::Double, self.coords.row(index))?;
            Some(EvalPoint::with_context(
                coord,
                PointContext {
                    index,
                    element: None,
                },
            ))
        }))
    }

    fn local_len(&self) -> usize {
        self.indices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_array_input_declared_kind() {
        let coords = array![[0.0, 1.0], [2.0, 3.0]];
        let input = ArrayInput::new(coords.clone(), IoKind::Vector).unwrap();
        assert_eq!(input.local_len(), 2);
        let points: Vec<_> = input.points().collect();
        assert_eq!(points[1].coord().as_slice(), &[2.0, 3.0]);
        assert_eq!(points[1].coord().descriptor().kind(), IoKind::Vector);
        assert!(points[0].context().is_none());
        assert_eq!(input.point(1), Some(points[1].clone()));
        assert_eq!(input.point(2), None);

        assert!(matches!(
            ArrayInput::new(coords, IoKind::Tensor),
            Err(EvaluationError::DeclaredTypeMismatch { width: 2, .. })
        ));
    }

    #[test]
    fn test_index_set_input() {
        let coords = Arc::new(array![[0.0], [1.0], [2.0], [3.0]]);
        let input = IndexSetInput::new(coords.clone(), vec![3, 1]).unwrap();
        let points: Vec<_> = input.points().collect();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].coord().as_slice(), &[3.0]);
        assert_eq!(points[0].context().map(|c| c.index), Some(3));

        // restartable
        assert_eq!(input.points().count(), input.local_len());

        assert!(matches!(
            IndexSetInput::new(coords, vec![4]),
            Err(EvaluationError::InputType(_))
        ));
    }
}
