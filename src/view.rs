//! Recording views over Functions.
//!
//! [`min_max`] wraps a Function so that every evaluation passes its value
//! through unchanged while recording the smallest and largest value seen, and
//! optionally the value of an auxiliary Function at those extrema (for example
//! the coordinate at which the maximum velocity occurred).

use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::convert::{convert, operand, FnArg};
use crate::errors::{ConvertError, EvaluationError};
use crate::expr::{EvalContext, Function, NodeKind};
use crate::global::{Communicator, Message};
use crate::input::EvalPoint;
use crate::io::{IoBuffer, IoDescriptor};

#[derive(Debug, Clone, PartialEq)]
struct Extremum {
    value: f64,
    auxiliary: Option<IoBuffer>,
}

#[derive(Debug, Default)]
pub(crate) struct Extrema {
    min: Option<Extremum>,
    max: Option<Extremum>,
}

/// Node payload of a `min_max` view.
pub(crate) struct Recorder {
    function: Function,
    norm: Option<Function>,
    auxiliary: Option<Function>,
    state: Arc<Mutex<Extrema>>,
}

impl Recorder {
    pub(crate) fn function(&self) -> &Function {
        &self.function
    }

    pub(crate) fn children(&self) -> Vec<&Function> {
        std::iter::once(&self.function)
            .chain(self.norm.as_ref())
            .chain(self.auxiliary.as_ref())
            .collect()
    }

    pub(crate) fn evaluate(
        &self,
        point: &EvalPoint,
        ctx: &mut EvalContext,
    ) -> Result<IoBuffer, EvaluationError> {
        let value = self.function.eval_point(point, ctx)?;
        let measured = match &self.norm {
            Some(norm) => norm.eval_point(point, ctx)?,
            None => value.clone(),
        };
        let measure = scalar_measure(&measured)?;
        if measure.is_nan() {
            return Ok(value);
        }

        let (new_min, new_max) = {
            let state = self.state.lock();
            (
                state.min.as_ref().map_or(true, |m| measure < m.value),
                state.max.as_ref().map_or(true, |m| measure > m.value),
            )
        };
        if !(new_min || new_max) {
            return Ok(value);
        }

        let auxiliary = match &self.auxiliary {
            Some(aux) => Some(aux.eval_point(point, ctx)?),
            None => None,
        };
        let mut state = self.state.lock();
        if new_min && state.min.as_ref().map_or(true, |m| measure < m.value) {
            state.min = Some(Extremum {
                value: measure,
                auxiliary: auxiliary.clone(),
            });
        }
        if new_max && state.max.as_ref().map_or(true, |m| measure > m.value) {
            state.max = Some(Extremum {
                value: measure,
                auxiliary,
            });
        }
        Ok(value)
    }
}

fn scalar_measure(value: &IoBuffer) -> Result<f64, EvaluationError> {
    if !value.dtype().is_numeric() {
        return Err(EvaluationError::TypeMismatch {
            op: "min_max",
            expected: "a numeric value or norm",
            got: value.dtype(),
        });
    }
    match value.as_slice() {
        [v] => Ok(*v),
        _ => Err(EvaluationError::ShapeMismatch {
            op: "min_max",
            left: IoDescriptor::scalar(),
            right: value.descriptor(),
        }),
    }
}

/// A Function that records the extrema of its values.
///
/// Dereferences to the wrapped [`Function`], so it can be evaluated and composed
/// directly. Clones share the recorded state.
#[derive(Clone)]
pub struct MinMax {
    function: Function,
    state: Arc<Mutex<Extrema>>,
}

impl MinMax {
    pub fn function(&self) -> &Function {
        &self.function
    }

    /// Smallest value recorded on this worker since creation or the last reset.
    pub fn min_local(&self) -> Option<f64> {
        self.state.lock().min.as_ref().map(|m| m.value)
    }

    pub fn max_local(&self) -> Option<f64> {
        self.state.lock().max.as_ref().map(|m| m.value)
    }

    /// Auxiliary value recorded at the local minimum.
    pub fn min_local_auxiliary(&self) -> Option<IoBuffer> {
        self.state.lock().min.as_ref().and_then(|m| m.auxiliary.clone())
    }

    pub fn max_local_auxiliary(&self) -> Option<IoBuffer> {
        self.state.lock().max.as_ref().and_then(|m| m.auxiliary.clone())
    }

    /// Forgets all recorded extrema.
    pub fn reset(&self) {
        *self.state.lock() = Extrema::default();
    }

    /// Smallest value recorded on any worker. Collective: every worker must call it.
    pub fn min_global(&self, comm: &dyn Communicator) -> Result<Option<f64>, EvaluationError> {
        Ok(self.global_extrema(comm)?.0)
    }

    /// Largest value recorded on any worker. Collective: every worker must call it.
    pub fn max_global(&self, comm: &dyn Communicator) -> Result<Option<f64>, EvaluationError> {
        Ok(self.global_extrema(comm)?.1)
    }

    fn global_extrema(
        &self,
        comm: &dyn Communicator,
    ) -> Result<(Option<f64>, Option<f64>), EvaluationError> {
        let root = 0;
        let local = Message::Extrema {
            min: self.min_local(),
            max: self.max_local(),
        };
        let reduced = comm.gather(root, local)?.map(|messages| {
            let (mut min, mut max) = (None::<f64>, None::<f64>);
            for message in messages {
                if let Message::Extrema { min: lo, max: hi } = message {
                    min = match (min, lo) {
                        (Some(a), Some(b)) => Some(a.min(b)),
                        (a, b) => a.or(b),
                    };
                    max = match (max, hi) {
                        (Some(a), Some(b)) => Some(a.max(b)),
                        (a, b) => a.or(b),
                    };
                }
            }
            Message::Extrema { min, max }
        });
        match comm.broadcast(root, reduced)? {
            Message::Extrema { min, max } => Ok((min, max)),
            other => Err(crate::errors::CommError::Protocol(format!(
                "expected extrema, received {}",
                other.describe()
            ))
            .into()),
        }
    }
}

impl Deref for MinMax {
    type Target = Function;

    fn deref(&self) -> &Function {
        &self.function
    }
}

impl From<&MinMax> for Function {
    fn from(value: &MinMax) -> Self {
        value.function.clone()
    }
}

impl From<&MinMax> for FnArg {
    fn from(value: &MinMax) -> Self {
        FnArg::Function(value.function.clone())
    }
}

/// Wraps `function` in a view recording its extrema.
///
/// # Arguments
/// * `function` - The Function to pass through
/// * `fn_norm` - Scalar measure to record instead of the value itself, or `None`.
///   Required when `function` is not scalar valued.
/// * `fn_auxiliary` - Function evaluated and stored whenever a new extremum is found, or `None`
///
/// # Example
/// ```
/// use fngraph::prelude::*;
///
/// let x = input().at(0);
/// let view = view::min_max(x.sin(), None::<f64>, &x).unwrap();
/// view.evaluate(vec![vec![0.0], vec![1.5], vec![3.0]]).unwrap();
/// assert_eq!(view.max_local(), Some(1.5f64.sin()));
/// assert_eq!(view.max_local_auxiliary().unwrap().as_slice(), &[1.5]);
/// ```
pub fn min_max(
    function: impl Into<FnArg>,
    fn_norm: impl Into<FnArg>,
    fn_auxiliary: impl Into<FnArg>,
) -> Result<MinMax, ConvertError> {
    let function = operand("min_max", function)?;
    let state = Arc::new(Mutex::new(Extrema::default()));
    let node = Function::from_kind(NodeKind::MinMax(Recorder {
        function,
        norm: convert(fn_norm)?,
        auxiliary: convert(fn_auxiliary)?,
        state: state.clone(),
    }));
    Ok(MinMax {
        function: node,
        state,
    })
}
