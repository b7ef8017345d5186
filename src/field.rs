//! External data items as Function leaves.
//!
//! A [`FieldSource`] is the boundary between the engine and a discretised
//! structure that owns data: a mesh variable, a particle variable, a lookup
//! table. Wrapping one with [`Function::field`] lets it take part in any
//! expression, and graphs built on top of it list it in
//! [`Function::underlying_data_items`].
//!
//! Two sources are provided:
//! - [`DomainField`]: a Function defined only over an axis-aligned local subdomain,
//!   raising `OutOfDomain` elsewhere, as a partitioned mesh variable does
//! - [`IndexedField`]: one row of values per item, resolvable only through the
//!   [`PointContext`](crate::input::PointContext) of points produced by a
//!   `FunctionInput`, as a particle variable is

use std::fmt;

use ndarray::Array2;

use crate::errors::EvaluationError;
use crate::expr::{EvalContext, Function};
use crate::input::{default_kind, EvalPoint};
use crate::io::{DataType, IoBuffer, IoDescriptor, IoKind};

/// A data item that can be evaluated at a point.
pub trait FieldSource: Send + Sync + fmt::Debug {
    /// Name shown when the owning Function is displayed.
    fn name(&self) -> &str;

    /// Value at `point`.
    ///
    /// Implementations return `EvaluationError::OutOfDomain` for points they do not
    /// own locally; global evaluation relies on that distinction.
    fn evaluate_at(
        &self,
        point: &EvalPoint,
        ctx: &mut EvalContext,
    ) -> Result<IoBuffer, EvaluationError>;
}

/// A Function restricted to the box `lower <= coord <= upper`.
#[derive(Debug)]
pub struct DomainField {
    name: String,
    lower: Vec<f64>,
    upper: Vec<f64>,
    function: Function,
}

impl DomainField {
    /// # Arguments
    /// * `name` - Display name of the field
    /// * `lower` - Inclusive lower corner of the locally owned box
    /// * `upper` - Inclusive upper corner of the locally owned box
    /// * `function` - Values of the field inside the box
    pub fn new(
        name: impl Into<String>,
        lower: &[f64],
        upper: &[f64],
        function: impl Into<Function>,
    ) -> Self {
        Self {
            name: name.into(),
            lower: lower.to_vec(),
            upper: upper.to_vec(),
            function: function.into(),
        }
    }

    /// True when `coord` has the box dimension and lies inside it.
    pub fn contains(&self, coord: &[f64]) -> bool {
        coord.len() == self.lower.len()
            && coord
                .iter()
                .zip(self.lower.iter().zip(&self.upper))
                .all(|(x, (lo, hi))| lo <= x && x <= hi)
    }
}

impl FieldSource for DomainField {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate_at(
        &self,
        point: &EvalPoint,
        ctx: &mut EvalContext,
    ) -> Result<IoBuffer, EvaluationError> {
        let coord = point.coord().as_slice();
        if coord.len() != self.lower.len() {
            return Err(EvaluationError::InputType(format!(
                "'{}' is defined over {} dimension(s), got a coordinate of {}",
                self.name,
                self.lower.len(),
                coord.len()
            )));
        }
        if !self.contains(coord) {
            return Err(EvaluationError::OutOfDomain {
                source_name: self.name.clone(),
                coord: coord.to_vec(),
            });
        }
        self.function.eval_point(point, ctx)
    }
}

/// Per-item values addressed by the index in a point's context.
#[derive(Debug, Clone)]
pub struct IndexedField {
    name: String,
    values: Array2<f64>,
    kind: IoKind,
    dtype: DataType,
}

impl IndexedField {
    /// One row of `values` per item, read as doubles.
    pub fn new(name: impl Into<String>, values: Array2<f64>) -> Self {
        let kind = default_kind(values.ncols());
        Self {
            name: name.into(),
            values,
            kind,
            dtype: DataType::Double,
        }
    }

    /// Reads the stored values as `dtype`, e.g. integer material indices.
    pub fn with_dtype(mut self, dtype: DataType) -> Self {
        self.dtype = dtype;
        self
    }
}

impl FieldSource for IndexedField {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate_at(
        &self,
        point: &EvalPoint,
        _ctx: &mut EvalContext,
    ) -> Result<IoBuffer, EvaluationError> {
        let context = point
            .context()
            .ok_or_else(|| EvaluationError::MissingContext(self.name.clone()))?;
        let out_of_domain = || EvaluationError::OutOfDomain {
            source_name: self.name.clone(),
            coord: point.coord().as_slice().to_vec(),
        };
        if context.index >= self.values.nrows() {
            return Err(out_of_domain());
        }
        let descriptor = IoDescriptor::new(self.kind, self.values.ncols()).ok_or_else(out_of_domain)?;
        Ok(IoBuffer::new(
            descriptor,
            self.dtype,
            self.values.row(context.index).iter().copied().collect(),
        ))
    }
}
