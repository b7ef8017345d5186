//! Elementwise unary operators.
//!
//! This module provides:
//! - The [`UnaryOp`] set: negation, logical not, the trigonometric and hyperbolic
//!   families with their inverses, exponentials and logarithms, `sqrt`, `erf`,
//!   `erfc` and `abs`
//! - Type checking of the operand (numeric or bool depending on the operator)
//! - Per-component fault classification for `SafeMaths`
//!
//! `erf` and `erfc` come from `libm`, the remaining functions use the `f64` methods.

use std::fmt;

use crate::errors::EvaluationError;
use crate::expr::EvalContext;
use crate::faults::{FaultFlags, Probe};
use crate::io::{bool_to_f64, DataType, IoBuffer};
use crate::operators::{require_bool, require_numeric};

/// A unary operator applied independently to every component of its operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Negate,
    Not,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Asinh,
    Acosh,
    Atanh,
    Exp,
    Log,
    Log2,
    Log10,
    Sqrt,
    Erf,
    Erfc,
    Abs,
}

impl UnaryOp {
    /// Name used in error messages and in the textual form of function calls.
    pub fn name(&self) -> &'static str {
        match self {
            UnaryOp::Negate => "negate",
            UnaryOp::Not => "logical_not",
            UnaryOp::Sin => "sin",
            UnaryOp::Cos => "cos",
            UnaryOp::Tan => "tan",
            UnaryOp::Asin => "asin",
            UnaryOp::Acos => "acos",
            UnaryOp::Atan => "atan",
            UnaryOp::Sinh => "sinh",
            UnaryOp::Cosh => "cosh",
            UnaryOp::Tanh => "tanh",
            UnaryOp::Asinh => "asinh",
            UnaryOp::Acosh => "acosh",
            UnaryOp::Atanh => "atanh",
            UnaryOp::Exp => "exp",
            UnaryOp::Log => "log",
            UnaryOp::Log2 => "log2",
            UnaryOp::Log10 => "log10",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Erf => "erf",
            UnaryOp::Erfc => "erfc",
            UnaryOp::Abs => "abs",
        }
    }

    /// Computes the operator for one component together with how it may fault.
    fn kernel(&self, x: f64) -> (f64, Probe) {
        match self {
            UnaryOp::Negate => (-x, Probe::Exact),
            UnaryOp::Not => (bool_to_f64(x == 0.0), Probe::Exact),
            UnaryOp::Abs => (x.abs(), Probe::Exact),
            UnaryOp::Sin => (x.sin(), Probe::Plain),
            UnaryOp::Cos => (x.cos(), Probe::Plain),
            UnaryOp::Tan => (x.tan(), Probe::Plain),
            UnaryOp::Asin => (x.asin(), Probe::Plain),
            UnaryOp::Acos => (x.acos(), Probe::Plain),
            UnaryOp::Atan => (x.atan(), Probe::Plain),
            UnaryOp::Sinh => (x.sinh(), Probe::Plain),
            UnaryOp::Cosh => (x.cosh(), Probe::Plain),
            UnaryOp::Tanh => (x.tanh(), Probe::Plain),
            UnaryOp::Asinh => (x.asinh(), Probe::Plain),
            UnaryOp::Acosh => (x.acosh(), Probe::Plain),
            UnaryOp::Atanh => (x.atanh(), pole_if(x.abs() == 1.0)),
            UnaryOp::Exp => (x.exp(), Probe::Shrinking),
            UnaryOp::Log => (x.ln(), pole_if(x == 0.0)),
            UnaryOp::Log2 => (x.log2(), pole_if(x == 0.0)),
            UnaryOp::Log10 => (x.log10(), pole_if(x == 0.0)),
            UnaryOp::Sqrt => (x.sqrt(), Probe::Plain),
            UnaryOp::Erf => (libm::erf(x), Probe::Plain),
            UnaryOp::Erfc => (libm::erfc(x), Probe::Shrinking),
        }
    }

    /// Element type of the result for an operand of type `dtype`.
    fn result_dtype(&self, dtype: DataType) -> DataType {
        match self {
            UnaryOp::Negate | UnaryOp::Abs => dtype,
            UnaryOp::Not => DataType::Bool,
            _ => DataType::Double,
        }
    }

    /// Applies the operator to every component of `arg`.
    ///
    /// # Arguments
    /// * `arg` - The evaluated operand
    /// * `ctx` - Evaluation context receiving any fault flags raised
    ///
    /// # Returns
    /// A buffer with the operand's descriptor, or `TypeMismatch` when the operand
    /// type is not accepted (bool for numeric operators, non-bool for `Not`).
    pub(crate) fn apply(
        &self,
        arg: &IoBuffer,
        ctx: &mut EvalContext,
    ) -> Result<IoBuffer, EvaluationError> {
        match self {
            UnaryOp::Not => require_bool(self.name(), arg)?,
            _ => require_numeric(self.name(), arg)?,
        }

        let mut raised = FaultFlags::empty();
        let values = arg
            .as_slice()
            .iter()
            .map(|&x| {
                let (value, probe) = self.kernel(x);
                raised |= FaultFlags::probe(&[x], value, probe);
                value
            })
            .collect();
        ctx.record(raised);

        Ok(IoBuffer::new(
            arg.descriptor(),
            self.result_dtype(arg.dtype()),
            values,
        ))
    }

    /// Writes the textual form of this operator applied to `arg`.
    pub(crate) fn fmt_expr(&self, f: &mut fmt::Formatter<'_>, arg: &dyn fmt::Display) -> fmt::Result {
        match self {
            UnaryOp::Negate => write!(f, "-({arg})"),
            UnaryOp::Not => write!(f, "!({arg})"),
            UnaryOp::Abs => write!(f, "|{arg}|"),
            op => write!(f, "{}({arg})", op.name()),
        }
    }
}

fn pole_if(at_pole: bool) -> Probe {
    if at_pole {
        Probe::Pole
    } else {
        Probe::Plain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::IoKind;

    fn apply(op: UnaryOp, arg: &IoBuffer) -> (Result<IoBuffer, EvaluationError>, FaultFlags) {
        let mut ctx = EvalContext::default();
        let result = op.apply(arg, &mut ctx);
        (result, ctx.faults())
    }

    #[test]
    fn test_elementwise() {
        let arg = IoBuffer::from_slice(IoKind::Vector, &[0.0, 1.0, 4.0]).unwrap();
        let (result, faults) = apply(UnaryOp::Sqrt, &arg);
        let result = result.unwrap();
        assert_eq!(result.as_slice(), &[0.0, 1.0, 2.0]);
        assert_eq!(result.descriptor(), arg.descriptor());
        assert!(faults.is_empty());
    }

    #[test]
    fn test_negate_keeps_int() {
        let (result, _) = apply(UnaryOp::Negate, &IoBuffer::int(3));
        let result = result.unwrap();
        assert_eq!(result.dtype(), DataType::Int);
        assert_eq!(result.as_int(), Some(-3));

        let (result, _) = apply(UnaryOp::Sin, &IoBuffer::int(0));
        assert_eq!(result.unwrap().dtype(), DataType::Double);
    }

    #[test]
    fn test_not_requires_bool() {
        let (result, _) = apply(UnaryOp::Not, &IoBuffer::boolean(true));
        assert_eq!(result.unwrap().as_bool(), Some(false));

        let (result, _) = apply(UnaryOp::Not, &IoBuffer::double(1.0));
        assert!(matches!(result, Err(EvaluationError::TypeMismatch { .. })));

        let (result, _) = apply(UnaryOp::Exp, &IoBuffer::boolean(true));
        assert!(matches!(result, Err(EvaluationError::TypeMismatch { .. })));
    }

    #[test]
    fn test_log_faults() {
        let (result, faults) = apply(UnaryOp::Log, &IoBuffer::double(0.0));
        assert_eq!(result.unwrap().as_slice(), &[f64::NEG_INFINITY]);
        assert_eq!(faults, FaultFlags::DIVIDE_BY_ZERO);

        let (_, faults) = apply(UnaryOp::Log10, &IoBuffer::double(-1.0));
        assert_eq!(faults, FaultFlags::INVALID);

        let (_, faults) = apply(UnaryOp::Exp, &IoBuffer::double(1000.0));
        assert_eq!(faults, FaultFlags::OVERFLOW);

        let (_, faults) = apply(UnaryOp::Exp, &IoBuffer::double(-1000.0));
        assert_eq!(faults, FaultFlags::UNDERFLOW);
    }

    #[test]
    fn test_erf() {
        let (result, _) = apply(UnaryOp::Erf, &IoBuffer::double(0.0));
        assert_eq!(result.unwrap().as_slice(), &[0.0]);
        let (result, _) = apply(UnaryOp::Erfc, &IoBuffer::double(0.0));
        assert!((result.unwrap().as_slice()[0] - 1.0).abs() < 1e-15);
    }
}
