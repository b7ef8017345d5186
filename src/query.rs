//! Evaluation Query: drives a Function over a batch of points.
//!
//! A query walks the points of its data in order, evaluates the Function graph at
//! each one and stacks the per-point buffers into a [`Results`] array of shape
//! `(points, output width)`. The first failing point aborts the batch; the
//! per-point variant [`Query::outcomes`] is what the global coordinator builds on.

use log::debug;
use ndarray::Array2;
use rayon::prelude::*;

use crate::backends::points::{EvalData, PointSource};
use crate::errors::EvaluationError;
use crate::expr::{EvalContext, Function};
use crate::input::{EvalPoint, FunctionInput};
use crate::io::{DataType, IoBuffer, IoDescriptor, IoKind};

/// Values of a Function over a batch of points, one row per point.
#[derive(Debug, Clone, PartialEq)]
pub struct Results {
    values: Array2<f64>,
    descriptor: Option<IoDescriptor>,
    dtype: Option<DataType>,
}

impl Results {
    fn empty() -> Self {
        Self {
            values: Array2::zeros((0, 0)),
            descriptor: None,
            dtype: None,
        }
    }

    /// Stacks per-point buffers, which must share one output width.
    ///
    /// Rows of differing data types are promoted to `Double`.
    pub(crate) fn from_buffers(buffers: Vec<IoBuffer>) -> Result<Self, EvaluationError> {
        let Some(first) = buffers.first() else {
            return Ok(Self::empty());
        };
        let descriptor = first.descriptor();
        let mut dtype = first.dtype();
        for buffer in &buffers[1..] {
            if buffer.width() != descriptor.width() {
                return Err(EvaluationError::InconsistentOutput {
                    first: descriptor,
                    later: buffer.descriptor(),
                });
            }
            if buffer.dtype() != dtype {
                dtype = DataType::Double;
            }
        }

        let rows = buffers.len();
        let flat: Vec<f64> = buffers
            .into_iter()
            .flat_map(|buffer| buffer.into_values())
            .collect();
        let values = Array2::from_shape_vec((rows, descriptor.width()), flat)
            .map_err(|e| EvaluationError::InputType(e.to_string()))?;
        Ok(Self {
            values,
            descriptor: Some(descriptor),
            dtype: Some(dtype),
        })
    }

    /// The `(points, output width)` array of values. Booleans read as 0 or 1.
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn into_values(self) -> Array2<f64> {
        self.values
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn len(&self) -> usize {
        self.values.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.values.nrows() == 0
    }

    /// Output descriptor of the first point, `None` for an empty batch.
    pub fn descriptor(&self) -> Option<IoDescriptor> {
        self.descriptor
    }

    pub fn dtype(&self) -> Option<DataType> {
        self.dtype
    }

    /// The value at point `index` as a buffer.
    pub fn row(&self, index: usize) -> Option<IoBuffer> {
        let descriptor = self.descriptor?;
        let dtype = self.dtype?;
        (index < self.len()).then(|| {
            IoBuffer::new(descriptor, dtype, self.values.row(index).iter().copied().collect())
        })
    }
}

/// A configured evaluation of one Function.
///
/// # Example
/// ```
/// use fngraph::prelude::*;
///
/// let r = input();
/// let radius = r.dot(&r).sqrt();
/// let results = Query::new(&radius)
///     .with_input_type(IoKind::Vector)
///     .evaluate(vec![vec![3.0, 4.0], vec![6.0, 8.0]])
///     .unwrap();
/// assert_eq!(results.values().column(0).to_vec(), vec![5.0, 10.0]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Query<'f> {
    function: &'f Function,
    input_type: Option<IoKind>,
}

impl<'f> Query<'f> {
    pub fn new(function: &'f Function) -> Self {
        Self {
            function,
            input_type: None,
        }
    }

    /// Declares the kind of every input row. Not allowed for `FunctionInput` data.
    pub fn with_input_type(mut self, kind: IoKind) -> Self {
        self.input_type = Some(kind);
        self
    }

    fn evaluate_point(&self, point: &EvalPoint) -> Result<IoBuffer, EvaluationError> {
        self.function.eval_point(point, &mut EvalContext::new())
    }

    /// Evaluates every point in order, stopping at the first failure.
    ///
    /// # Arguments
    /// * `data` - Raw coordinates or a `FunctionInput`
    ///
    /// # Returns
    /// * `Ok(Results)` - One row per point, in input order
    /// * `Err(EvaluationError)` - The input could not be read, or a point failed
    pub fn evaluate<'a>(&self, data: impl Into<EvalData<'a>>) -> Result<Results, EvaluationError> {
        let source = data.into().into_source(self.input_type)?;
        let Some(input) = source.input() else {
            return Ok(Results::empty());
        };
        debug!("evaluating {} over {} point(s)", self.function, input.local_len());
        let buffers = input
            .points()
            .map(|point| self.evaluate_point(&point))
            .collect::<Result<Vec<_>, _>>()?;
        let results = Results::from_buffers(buffers)?;
        debug!(
            "evaluated {} point(s), output {}",
            results.len(),
            results
                .descriptor()
                .map_or_else(|| "none".to_string(), |d| d.to_string())
        );
        Ok(results)
    }

    /// Evaluates every point, keeping each point's outcome.
    ///
    /// Only errors reading the input abort the whole batch.
    pub fn outcomes<'a>(
        &self,
        data: impl Into<EvalData<'a>>,
    ) -> Result<Vec<Result<IoBuffer, EvaluationError>>, EvaluationError> {
        let source = data.into().into_source(self.input_type)?;
        Ok(match source.input() {
            Some(input) => input
                .points()
                .map(|point| self.evaluate_point(&point))
                .collect(),
            None => Vec::new(),
        })
    }

    /// Like [`Query::evaluate`], spreading raw array rows over the rayon pool.
    ///
    /// Row order is preserved. `FunctionInput` data is walked sequentially since
    /// providers are not required to be shareable across threads.
    pub fn evaluate_par<'a>(
        &self,
        data: impl Into<EvalData<'a>>,
    ) -> Result<Results, EvaluationError> {
        let source = data.into().into_source(self.input_type)?;
        let array = match &source {
            PointSource::Owned(array) => array,
            PointSource::Borrowed(_) => return self.evaluate_source(&source),
            PointSource::Empty => return Ok(Results::empty()),
        };

        let rows: Vec<usize> = (0..array.local_len()).collect();
        let num_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(8);
        let chunk_size = (rows.len() / (num_threads * 4)).max(1);
        debug!(
            "evaluating {} over {} point(s) in chunks of {chunk_size}",
            self.function,
            rows.len()
        );

        let chunks = rows
            .par_chunks(chunk_size)
            .map(|chunk| {
                chunk
                    .iter()
                    .filter_map(|&row| array.point(row))
                    .map(|point| self.evaluate_point(&point))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Results::from_buffers(chunks.into_iter().flatten().collect())
    }

    fn evaluate_source(&self, source: &PointSource<'_>) -> Result<Results, EvaluationError> {
        match source.input() {
            Some(input) => Results::from_buffers(
                input
                    .points()
                    .map(|point| self.evaluate_point(&point))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => Ok(Results::empty()),
        }
    }
}

/// Evaluates `function` over `data`.
///
/// # Arguments
/// * `function` - The Function to evaluate
/// * `data` - Raw coordinates or a `FunctionInput`
/// * `input_type` - Declared kind of each input row, or `None` to infer it from the row width
pub fn evaluate<'a>(
    function: &Function,
    data: impl Into<EvalData<'a>>,
    input_type: Option<IoKind>,
) -> Result<Results, EvaluationError> {
    let query = Query::new(function);
    match input_type {
        Some(kind) => query.with_input_type(kind).evaluate(data),
        None => query.evaluate(data),
    }
}

impl Function {
    /// Evaluates this Function over `data`, inferring the input kind from the row width:
    /// rows of one value are scalars, wider rows are arrays.
    ///
    /// # Example
    /// ```
    /// use fngraph::prelude::*;
    ///
    /// let f = input().at(0) * 2.0;
    /// assert_eq!(f.evaluate(1.5).unwrap().values()[[0, 0]], 3.0);
    /// ```
    pub fn evaluate<'a>(&self, data: impl Into<EvalData<'a>>) -> Result<Results, EvaluationError> {
        Query::new(self).evaluate(data)
    }

    /// Evaluates this Function over `data`, declaring every row to be of `kind`.
    pub fn evaluate_as<'a>(
        &self,
        data: impl Into<EvalData<'a>>,
        kind: IoKind,
    ) -> Result<Results, EvaluationError> {
        Query::new(self).with_input_type(kind).evaluate(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::FnArg;
    use crate::input::IndexSetInput;
    use crate::math;
    use crate::ops::input;
    use ndarray::array;
    use std::sync::Arc;

    #[test]
    fn test_evaluate_rows() {
        let x = input().at(0);
        let f = &x * &x + 1.0;
        let results = f.evaluate(array![[0.0], [1.0], [2.0]]).unwrap();
        assert_eq!(results.shape(), (3, 1));
        assert_eq!(results.values().column(0).to_vec(), vec![1.0, 2.0, 5.0]);
        assert_eq!(results.descriptor(), Some(IoDescriptor::scalar()));
        assert_eq!(results.dtype(), Some(DataType::Double));
    }

    #[test]
    fn test_vector_output() {
        let v = input();
        let f = &v * 2.0;
        let results = f.evaluate(vec![vec![1.0, 2.0, 3.0], vec![0.0, 0.5, 1.0]]).unwrap();
        assert_eq!(results.shape(), (2, 3));
        assert_eq!(results.values().row(1).to_vec(), vec![0.0, 1.0, 2.0]);
        assert_eq!(results.row(0).unwrap().as_slice(), &[2.0, 4.0, 6.0]);
        assert!(results.row(2).is_none());
    }

    #[test]
    fn test_declared_input_type() {
        let v = input();
        let results = v.evaluate_as(vec![1.0, 2.0], IoKind::Vector).unwrap();
        assert_eq!(results.descriptor().map(|d| d.kind()), Some(IoKind::Vector));

        let err = evaluate(&v, vec![1.0, 2.0, 3.0, 4.0, 5.0], Some(IoKind::Tensor)).unwrap_err();
        assert!(matches!(err, EvaluationError::DeclaredTypeMismatch { width: 5, .. }));
    }

    #[test]
    fn test_function_input_rejects_declared_type() {
        let coords = Arc::new(array![[0.0], [1.0]]);
        let subset = IndexSetInput::new(coords, vec![1, 0]).unwrap();
        let f = input().at(0) + 10.0;
        assert_eq!(
            f.evaluate(&subset).unwrap().values().column(0).to_vec(),
            vec![11.0, 10.0]
        );
        assert!(matches!(
            f.evaluate_as(&subset, IoKind::Scalar),
            Err(EvaluationError::InputType(_))
        ));
    }

    #[test]
    fn test_first_failure_aborts() {
        let x = input().at(0);
        let f = (1.0 / &x).safe_maths();
        assert!(f.evaluate(vec![vec![1.0], vec![0.0], vec![2.0]]).is_err());

        let outcomes = Query::new(&f)
            .outcomes(vec![vec![1.0], vec![0.0], vec![2.0]])
            .unwrap();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_ok() && outcomes[1].is_err() && outcomes[2].is_ok());
    }

    #[test]
    fn test_empty_batch() {
        let results = input().evaluate(Vec::<Vec<f64>>::new()).unwrap();
        assert_eq!(results.shape(), (0, 0));
        assert!(results.is_empty());
        assert_eq!(results.descriptor(), None);
    }

    #[test]
    fn test_empty_batch_checks_declared_type() {
        let empty = Array2::<f64>::zeros((0, 5));
        assert!(matches!(
            input().evaluate_as(empty.clone(), IoKind::Tensor),
            Err(EvaluationError::DeclaredTypeMismatch { .. })
        ));
        assert!(matches!(
            Query::new(&input())
                .with_input_type(IoKind::Tensor)
                .evaluate_par(empty),
            Err(EvaluationError::DeclaredTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_mixed_dtypes_promote() {
        let x = input().at(0);
        let f = crate::branching::conditional([
            (x.less(0), FnArg::from(1)),
            (x.greater_equal(0), FnArg::from(2.5)),
        ])
        .unwrap();
        let results = f.evaluate(vec![vec![-1], vec![1]]).unwrap();
        assert_eq!(results.values().column(0).to_vec(), vec![1.0, 2.5]);
        assert_eq!(results.dtype(), Some(DataType::Double));
    }

    #[test]
    fn test_inconsistent_output() {
        let x = input().at(0);
        let f = crate::branching::conditional([
            (x.less(0.0), Function::from(1.0)),
            (x.greater_equal(0.0), crate::convert::convert([1.0, 2.0]).unwrap().unwrap()),
        ])
        .unwrap();
        assert!(matches!(
            f.evaluate(vec![vec![-1.0], vec![1.0]]),
            Err(EvaluationError::InconsistentOutput { .. })
        ));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let x = input().at(0);
        let f = math::sin(&x).unwrap() * math::exp(-&x).unwrap();
        let coords = Array2::from_shape_fn((1000, 1), |(i, _)| i as f64 * 0.01);
        let sequential = f.evaluate(&coords).unwrap();
        let parallel = Query::new(&f).evaluate_par(&coords).unwrap();
        assert_eq!(sequential, parallel);

        let coords = Arc::new(coords);
        let subset = IndexSetInput::new(coords, vec![5, 3, 1]).unwrap();
        assert_eq!(
            Query::new(&f).evaluate_par(&subset).unwrap(),
            f.evaluate(&subset).unwrap()
        );
    }
}
