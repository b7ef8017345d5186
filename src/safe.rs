//! Fault-detecting wrapper.
//!
//! A SafeMaths node, built by [`safe_maths`], evaluates its child as a
//! transparent pass-through and then inspects the floating point faults raised
//! while doing so. Any fault in the checked set turns the result into an
//! [`EvaluationError::NumericFault`] instead of letting an infinity or NaN escape.
//!
//! The check is scoped to the wrapped subtree: flags raised before the wrapper
//! are set aside, the child runs against a clean slate, and the outer flags are
//! restored afterwards. Every evaluation is therefore checked independently.

use crate::errors::EvaluationError;
use crate::expr::{EvalContext, Function, NodeKind};
use crate::faults::FaultFlags;
use crate::input::EvalPoint;
use crate::io::IoBuffer;

/// Wraps `function`, checking all four fault classes.
///
/// # Example
/// ```
/// use fngraph::prelude::*;
///
/// let x = input().at(0);
/// let guarded = safe_maths(1.0 / x);
/// assert_eq!(guarded.evaluate(4.0).unwrap().values()[[0, 0]], 0.25);
/// assert!(matches!(
///     guarded.evaluate(0.0),
///     Err(EvaluationError::NumericFault(FaultKind::DivideByZero))
/// ));
/// ```
pub fn safe_maths(function: impl Into<Function>) -> Function {
    safe_maths_masked(function, FaultFlags::all())
}

/// Wraps `function`, checking only the fault classes in `mask`.
pub fn safe_maths_masked(function: impl Into<Function>, mask: FaultFlags) -> Function {
    Function::from_kind(NodeKind::Safe {
        arg: function.into(),
        mask,
    })
}

impl Function {
    /// Method form of [`safe_maths`].
    pub fn safe_maths(&self) -> Function {
        safe_maths(self)
    }

    /// Method form of [`safe_maths_masked`].
    pub fn safe_maths_masked(&self, mask: FaultFlags) -> Function {
        safe_maths_masked(self, mask)
    }
}

pub(crate) fn guarded(
    function: &Function,
    mask: FaultFlags,
    point: &EvalPoint,
    ctx: &mut EvalContext,
) -> Result<IoBuffer, EvaluationError> {
    let outer = ctx.swap_faults(FaultFlags::empty());
    let result = function.eval_point(point, ctx);
    let raised = ctx.swap_faults(outer);

    let value = result?;
    match (raised & mask).first_fault() {
        Some(kind) => Err(EvaluationError::NumericFault(kind)),
        None => {
            // unchecked classes still propagate to enclosing wrappers
            ctx.record(raised);
            Ok(value)
        }
    }
}
