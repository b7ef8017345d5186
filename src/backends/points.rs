//! Raw evaluation data accepted by [`Query`](crate::query::Query).
//!
//! Anything convertible into [`EvalData`] can be handed to `evaluate`: a single
//! number, one point given as a vector of numbers, many points given as nested
//! vectors or as the rows of a matrix, or a [`FunctionInput`] provider.
//! Integer data produces integer coordinates, which is what `map` keys expect.
//! 64-bit integers are checked against [`MAX_EXACT_INT`] when the data is resolved.
//!
//! Without a declared input type, rows of one value are scalars and wider rows are
//! arrays. Declare [`IoKind::Array`] explicitly to get array points of width one.

use ndarray::{Array1, Array2, Axis};

use crate::errors::EvaluationError;
use crate::input::{default_kind, ArrayInput, FunctionInput};
use crate::io::{is_exact_int, DataType, IoKind, MAX_EXACT_INT};

/// Evaluation data: raw coordinates or a point provider.
///
/// # Examples
///
/// ```rust
/// use fngraph::prelude::*;
///
/// let x = input().at(0);
/// // one point
/// assert_eq!(x.evaluate(2.0).unwrap().shape(), (1, 1));
/// // one point with three coordinates
/// assert_eq!(input().evaluate(vec![1.0, 2.0, 3.0]).unwrap().shape(), (1, 3));
/// // three points
/// assert_eq!(x.evaluate(vec![vec![1.0], vec![2.0], vec![3.0]]).unwrap().shape(), (3, 1));
/// ```
#[derive(Clone)]
pub enum EvalData<'a> {
    /// One point per row
    Array { values: Array2<f64>, dtype: DataType },
    /// One point per inner vector; rows must share a length
    Rows { rows: Vec<Vec<f64>>, dtype: DataType },
    /// One integer point per row
    IntArray(Array2<i64>),
    /// One integer point per inner vector
    IntRows(Vec<Vec<i64>>),
    /// Points supplied by an external provider
    Input(&'a dyn FunctionInput),
}

/// Points ready to be walked, owned or borrowed.
pub(crate) enum PointSource<'a> {
    Owned(ArrayInput),
    Borrowed(&'a dyn FunctionInput),
    Empty,
}

impl PointSource<'_> {
    pub(crate) fn input(&self) -> Option<&dyn FunctionInput> {
        match self {
            PointSource::Owned(input) => Some(input as &dyn FunctionInput),
            PointSource::Borrowed(input) => Some(*input),
            PointSource::Empty => None,
        }
    }

    /// Row access for sources that support it.
    pub(crate) fn array(&self) -> Option<&ArrayInput> {
        match self {
            PointSource::Owned(input) => Some(input),
            _ => None,
        }
    }
}

impl<'a> EvalData<'a> {
    /// Number of points, when known without walking a provider.
    pub fn len(&self) -> usize {
        match self {
            EvalData::Array { values, .. } => values.nrows(),
            EvalData::Rows { rows, .. } => rows.len(),
            EvalData::IntArray(values) => values.nrows(),
            EvalData::IntRows(rows) => rows.len(),
            EvalData::Input(input) => input.local_len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves the data into points of `declared` kind, or of the default kind
    /// for the row width when nothing is declared.
    ///
    /// # Returns
    /// * `Err(EvaluationError::InputType)` - Ragged or empty rows, integers outside
    ///   `±MAX_EXACT_INT`, or a kind declared for a `FunctionInput`, which fixes its
    ///   own point types
    /// * `Err(EvaluationError::DeclaredTypeMismatch)` - Row width invalid for `declared`,
    ///   checked even when there are no rows
    pub(crate) fn into_source(
        self,
        declared: Option<IoKind>,
    ) -> Result<PointSource<'a>, EvaluationError> {
        let (values, dtype) = match self {
            EvalData::Input(input) => {
                return match declared {
                    Some(kind) => Err(EvaluationError::InputType(format!(
                        "an input type ({kind}) cannot be declared for a FunctionInput"
                    ))),
                    None => Ok(PointSource::Borrowed(input)),
                };
            }
            EvalData::Array { values, dtype } => (values, dtype),
            EvalData::Rows { rows, dtype } => (rows_to_array(rows)?, dtype),
            EvalData::IntArray(values) => (exact_ints(values)?, DataType::Int),
            EvalData::IntRows(rows) => (exact_ints(rows_to_array(rows)?)?, DataType::Int),
        };

        if let Some(kind) = declared {
            let width = values.ncols();
            if !kind.accepts_width(width) {
                return Err(EvaluationError::DeclaredTypeMismatch {
                    kind,
                    width,
                    expected: kind.expected_widths(),
                });
            }
        }
        if values.nrows() == 0 {
            return Ok(PointSource::Empty);
        }
        if values.ncols() == 0 {
            return Err(EvaluationError::InputType(
                "input rows hold no values".to_string(),
            ));
        }
        let kind = declared.unwrap_or_else(|| default_kind(values.ncols()));
        ArrayInput::with_dtype(values, kind, dtype).map(PointSource::Owned)
    }
}

fn exact_ints(values: Array2<i64>) -> Result<Array2<f64>, EvaluationError> {
    if let Some(v) = values.iter().find(|v| !is_exact_int(**v)) {
        return Err(EvaluationError::InputType(format!(
            "integer coordinate {v} cannot be represented exactly; ints must lie within ±{MAX_EXACT_INT}"
        )));
    }
    Ok(values.mapv(|v| v as f64))
}

fn rows_to_array<T: Clone>(rows: Vec<Vec<T>>) -> Result<Array2<T>, EvaluationError> {
    let width = rows.first().map_or(0, Vec::len);
    if let Some((index, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
        return Err(EvaluationError::InputType(format!(
            "row {index} has {} value(s), expected {width}",
            row.len()
        )));
    }
    let count = rows.len();
    let flat: Vec<T> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((count, width), flat)
        .map_err(|e| EvaluationError::InputType(e.to_string()))
}

fn single(values: Vec<f64>, dtype: DataType) -> EvalData<'static> {
    EvalData::Rows {
        rows: vec![values],
        dtype,
    }
}

impl From<f64> for EvalData<'_> {
    fn from(value: f64) -> Self {
        single(vec![value], DataType::Double)
    }
}

impl From<i32> for EvalData<'_> {
    fn from(value: i32) -> Self {
        single(vec![value as f64], DataType::Int)
    }
}

impl From<i64> for EvalData<'_> {
    fn from(value: i64) -> Self {
        EvalData::IntArray(Array2::from_elem((1, 1), value))
    }
}

impl From<bool> for EvalData<'_> {
    fn from(value: bool) -> Self {
        single(vec![crate::io::bool_to_f64(value)], DataType::Bool)
    }
}

impl From<Vec<f64>> for EvalData<'_> {
    fn from(value: Vec<f64>) -> Self {
        single(value, DataType::Double)
    }
}

impl From<&[f64]> for EvalData<'_> {
    fn from(value: &[f64]) -> Self {
        single(value.to_vec(), DataType::Double)
    }
}

impl<const N: usize> From<[f64; N]> for EvalData<'_> {
    fn from(value: [f64; N]) -> Self {
        single(value.to_vec(), DataType::Double)
    }
}

impl From<Vec<i32>> for EvalData<'_> {
    fn from(value: Vec<i32>) -> Self {
        single(value.into_iter().map(f64::from).collect(), DataType::Int)
    }
}

impl From<Vec<i64>> for EvalData<'_> {
    fn from(value: Vec<i64>) -> Self {
        EvalData::IntArray(Array1::from(value).insert_axis(Axis(0)))
    }
}

impl From<Vec<Vec<f64>>> for EvalData<'_> {
    fn from(rows: Vec<Vec<f64>>) -> Self {
        EvalData::Rows {
            rows,
            dtype: DataType::Double,
        }
    }
}

impl From<Vec<Vec<i32>>> for EvalData<'_> {
    fn from(rows: Vec<Vec<i32>>) -> Self {
        EvalData::Rows {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(f64::from).collect())
                .collect(),
            dtype: DataType::Int,
        }
    }
}

impl From<Vec<Vec<i64>>> for EvalData<'_> {
    fn from(rows: Vec<Vec<i64>>) -> Self {
        EvalData::IntRows(rows)
    }
}

impl From<Array2<f64>> for EvalData<'_> {
    fn from(values: Array2<f64>) -> Self {
        EvalData::Array {
            values,
            dtype: DataType::Double,
        }
    }
}

impl From<&Array2<f64>> for EvalData<'_> {
    fn from(values: &Array2<f64>) -> Self {
        EvalData::from(values.clone())
    }
}

impl From<Array2<i64>> for EvalData<'_> {
    fn from(values: Array2<i64>) -> Self {
        EvalData::IntArray(values)
    }
}

/// Rows of a nalgebra matrix, one point per row.
#[cfg(feature = "nalgebra")]
impl From<&nalgebra::DMatrix<f64>> for EvalData<'_> {
    fn from(matrix: &nalgebra::DMatrix<f64>) -> Self {
        let values = Array2::from_shape_fn((matrix.nrows(), matrix.ncols()), |(i, j)| {
            matrix[(i, j)]
        });
        EvalData::Array {
            values,
            dtype: DataType::Double,
        }
    }
}

impl<'a, T: FunctionInput> From<&'a T> for EvalData<'a> {
    fn from(input: &'a T) -> Self {
        EvalData::Input(input)
    }
}

impl<'a> From<&'a dyn FunctionInput> for EvalData<'a> {
    fn from(input: &'a dyn FunctionInput) -> Self {
        EvalData::Input(input)
    }
}
