//! Elementwise binary operators with scalar broadcasting.
//!
//! A width-1 operand is broadcast against a wider one; otherwise the widths must
//! match exactly. The result takes the descriptor of the wider operand.
//!
//! Int arithmetic stays Int only while every component lies within the exact
//! integer range; a wider result is returned as Double.

use std::fmt;

use smallvec::SmallVec;

use crate::errors::EvaluationError;
use crate::expr::EvalContext;
use crate::faults::{FaultFlags, Probe};
use crate::io::{bool_to_f64, fits_exact_int, DataType, IoBuffer, IoDescriptor};
use crate::operators::{require_bool, require_numeric};

/// Binary operators understood by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Min,
    Max,
    Atan2,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Arithmetic,
    Relational,
    Logical,
}

impl BinaryOp {
    pub fn name(&self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Subtract => "subtract",
            BinaryOp::Multiply => "multiply",
            BinaryOp::Divide => "divide",
            BinaryOp::Power => "pow",
            BinaryOp::Min => "min",
            BinaryOp::Max => "max",
            BinaryOp::Atan2 => "atan2",
            BinaryOp::Less => "less",
            BinaryOp::LessEqual => "less_equal",
            BinaryOp::Greater => "greater",
            BinaryOp::GreaterEqual => "greater_equal",
            BinaryOp::And => "logical_and",
            BinaryOp::Or => "logical_or",
            BinaryOp::Xor => "logical_xor",
        }
    }

    fn category(&self) -> Category {
        match self {
            BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
                Category::Relational
            }
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => Category::Logical,
            _ => Category::Arithmetic,
        }
    }

    fn kernel(&self, a: f64, b: f64) -> (f64, Probe) {
        match self {
            BinaryOp::Add => (a + b, Probe::Exact),
            BinaryOp::Subtract => (a - b, Probe::Exact),
            BinaryOp::Multiply => (a * b, Probe::Shrinking),
            BinaryOp::Divide => {
                let probe = if b == 0.0 { Probe::Pole } else { Probe::Shrinking };
                (a / b, probe)
            }
            BinaryOp::Power => {
                let probe = if a == 0.0 && b < 0.0 {
                    Probe::Pole
                } else {
                    Probe::Shrinking
                };
                (a.powf(b), probe)
            }
            BinaryOp::Min | BinaryOp::Max if a.is_nan() || b.is_nan() => (f64::NAN, Probe::Exact),
            BinaryOp::Min => (a.min(b), Probe::Exact),
            BinaryOp::Max => (a.max(b), Probe::Exact),
            BinaryOp::Atan2 => (a.atan2(b), Probe::Plain),
            BinaryOp::Less => (bool_to_f64(a < b), Probe::Ordered),
            BinaryOp::LessEqual => (bool_to_f64(a <= b), Probe::Ordered),
            BinaryOp::Greater => (bool_to_f64(a > b), Probe::Ordered),
            BinaryOp::GreaterEqual => (bool_to_f64(a >= b), Probe::Ordered),
            BinaryOp::And => (bool_to_f64(a != 0.0 && b != 0.0), Probe::Exact),
            BinaryOp::Or => (bool_to_f64(a != 0.0 || b != 0.0), Probe::Exact),
            BinaryOp::Xor => (bool_to_f64((a != 0.0) != (b != 0.0)), Probe::Exact),
        }
    }

    fn result_dtype(&self, lhs: DataType, rhs: DataType) -> DataType {
        match self.category() {
            Category::Relational | Category::Logical => DataType::Bool,
            Category::Arithmetic => match (self, lhs, rhs) {
                (
                    BinaryOp::Add
                    | BinaryOp::Subtract
                    | BinaryOp::Multiply
                    | BinaryOp::Min
                    | BinaryOp::Max,
                    DataType::Int,
                    DataType::Int,
                ) => DataType::Int,
                _ => DataType::Double,
            },
        }
    }

    /// Applies the operator component by component.
    ///
    /// # Arguments
    /// * `lhs` - Evaluated left operand
    /// * `rhs` - Evaluated right operand
    /// * `ctx` - Evaluation context receiving any fault flags raised
    ///
    /// # Returns
    /// * `Ok(IoBuffer)` - Result with the wider operand's descriptor
    /// * `Err(EvaluationError::TypeMismatch)` - Operand types not accepted by the operator
    /// * `Err(EvaluationError::ShapeMismatch)` - Widths differ and neither operand is scalar
    pub(crate) fn apply(
        &self,
        lhs: &IoBuffer,
        rhs: &IoBuffer,
        ctx: &mut EvalContext,
    ) -> Result<IoBuffer, EvaluationError> {
        match self.category() {
            Category::Arithmetic | Category::Relational => {
                require_numeric(self.name(), lhs)?;
                require_numeric(self.name(), rhs)?;
            }
            Category::Logical => {
                require_bool(self.name(), lhs)?;
                require_bool(self.name(), rhs)?;
            }
        }
        let descriptor = broadcast(self.name(), lhs.descriptor(), rhs.descriptor())?;

        let a = lhs.as_slice();
        let b = rhs.as_slice();
        let mut raised = FaultFlags::empty();
        let values: SmallVec<[f64; 9]> = (0..descriptor.width())
            .map(|i| {
                let x = a[if a.len() == 1 { 0 } else { i }];
                let y = b[if b.len() == 1 { 0 } else { i }];
                let (value, probe) = self.kernel(x, y);
                raised |= FaultFlags::probe(&[x, y], value, probe);
                value
            })
            .collect();
        ctx.record(raised);

        let dtype = match self.result_dtype(lhs.dtype(), rhs.dtype()) {
            DataType::Int if !values.iter().all(|v| fits_exact_int(*v)) => DataType::Double,
            dtype => dtype,
        };
        Ok(IoBuffer::new(descriptor, dtype, values))
    }

    /// Writes the textual form of this operator applied to `lhs` and `rhs`.
    pub(crate) fn fmt_expr(
        &self,
        f: &mut fmt::Formatter<'_>,
        lhs: &dyn fmt::Display,
        rhs: &dyn fmt::Display,
    ) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Power => return write!(f, "({lhs}^{rhs})"),
            BinaryOp::Min | BinaryOp::Max | BinaryOp::Atan2 => {
                return write!(f, "{}({lhs}, {rhs})", self.name())
            }
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "xor",
        };
        write!(f, "({lhs} {symbol} {rhs})")
    }
}

/// Resolves the output descriptor of an elementwise operation.
fn broadcast(
    op: &'static str,
    left: IoDescriptor,
    right: IoDescriptor,
) -> Result<IoDescriptor, EvaluationError> {
    if left.width() == right.width() {
        Ok(left)
    } else if left.is_scalar() {
        Ok(right)
    } else if right.is_scalar() {
        Ok(left)
    } else {
        Err(EvaluationError::ShapeMismatch { op, left, right })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::IoKind;

    fn apply(
        op: BinaryOp,
        lhs: &IoBuffer,
        rhs: &IoBuffer,
    ) -> (Result<IoBuffer, EvaluationError>, FaultFlags) {
        let mut ctx = EvalContext::default();
        let result = op.apply(lhs, rhs, &mut ctx);
        (result, ctx.faults())
    }

    fn vector(values: &[f64]) -> IoBuffer {
        IoBuffer::from_slice(IoKind::Vector, values).unwrap()
    }

    #[test]
    fn test_broadcast_scalar() {
        let (result, _) = apply(BinaryOp::Multiply, &IoBuffer::double(2.0), &vector(&[1.0, 2.0, 3.0]));
        let result = result.unwrap();
        assert_eq!(result.as_slice(), &[2.0, 4.0, 6.0]);
        assert_eq!(result.descriptor().kind(), IoKind::Vector);

        let (result, _) = apply(BinaryOp::Subtract, &vector(&[1.0, 2.0]), &IoBuffer::int(1));
        assert_eq!(result.unwrap().as_slice(), &[0.0, 1.0]);
    }

    #[test]
    fn test_shape_mismatch() {
        let (result, _) = apply(BinaryOp::Add, &vector(&[1.0, 2.0]), &vector(&[1.0, 2.0, 3.0]));
        assert!(matches!(
            result,
            Err(EvaluationError::ShapeMismatch { op: "add", .. })
        ));
    }

    #[test]
    fn test_int_arithmetic() {
        let (result, _) = apply(BinaryOp::Add, &IoBuffer::int(2), &IoBuffer::int(3));
        let result = result.unwrap();
        assert_eq!(result.dtype(), DataType::Int);
        assert_eq!(result.as_int(), Some(5));

        let (result, _) = apply(BinaryOp::Divide, &IoBuffer::int(3), &IoBuffer::int(2));
        let result = result.unwrap();
        assert_eq!(result.dtype(), DataType::Double);
        assert_eq!(result.as_slice(), &[1.5]);

        let (result, _) = apply(BinaryOp::Power, &IoBuffer::int(2), &IoBuffer::int(3));
        assert_eq!(result.unwrap().dtype(), DataType::Double);
    }

    #[test]
    fn test_int_overflow_demotes_to_double() {
        let big = IoBuffer::try_int(3_037_000_500).unwrap();
        let (result, _) = apply(BinaryOp::Multiply, &big, &big);
        let result = result.unwrap();
        assert_eq!(result.dtype(), DataType::Double);
        assert_eq!(result.as_int(), None);
        assert_eq!(result.as_slice(), &[3_037_000_500.0f64 * 3_037_000_500.0]);

        let edge = IoBuffer::try_int(crate::io::MAX_EXACT_INT).unwrap();
        let (result, _) = apply(BinaryOp::Add, &edge, &IoBuffer::int(0));
        assert_eq!(result.unwrap().dtype(), DataType::Int);
        let (result, _) = apply(BinaryOp::Add, &edge, &IoBuffer::int(1));
        assert_eq!(result.unwrap().dtype(), DataType::Double);
    }

    #[test]
    fn test_nan_operands() {
        let nan = IoBuffer::double(f64::NAN);
        for op in [BinaryOp::Min, BinaryOp::Max] {
            let (result, faults) = apply(op, &nan, &IoBuffer::double(1.0));
            assert!(result.unwrap().as_slice()[0].is_nan());
            assert!(faults.is_empty());
            let (result, _) = apply(op, &IoBuffer::double(1.0), &nan);
            assert!(result.unwrap().as_slice()[0].is_nan());
        }

        for op in [
            BinaryOp::Less,
            BinaryOp::LessEqual,
            BinaryOp::Greater,
            BinaryOp::GreaterEqual,
        ] {
            let (result, faults) = apply(op, &nan, &IoBuffer::double(1.0));
            assert_eq!(result.unwrap().as_bool(), Some(false));
            assert_eq!(faults, FaultFlags::INVALID);
        }

        let (_, faults) = apply(BinaryOp::Less, &IoBuffer::double(0.0), &IoBuffer::double(1.0));
        assert!(faults.is_empty());
    }

    #[test]
    fn test_relational_and_logical() {
        let (result, _) = apply(BinaryOp::Less, &IoBuffer::double(0.5), &IoBuffer::int(1));
        assert_eq!(result.unwrap().as_bool(), Some(true));

        let (result, _) = apply(
            BinaryOp::Xor,
            &IoBuffer::boolean(true),
            &IoBuffer::boolean(true),
        );
        assert_eq!(result.unwrap().as_bool(), Some(false));

        let (result, _) = apply(BinaryOp::And, &IoBuffer::double(1.0), &IoBuffer::boolean(true));
        assert!(matches!(result, Err(EvaluationError::TypeMismatch { .. })));

        let (result, _) = apply(BinaryOp::Add, &IoBuffer::boolean(true), &IoBuffer::double(1.0));
        assert!(matches!(result, Err(EvaluationError::TypeMismatch { .. })));
    }

    #[test]
    fn test_division_faults() {
        let (result, faults) = apply(BinaryOp::Divide, &IoBuffer::double(1.0), &IoBuffer::double(0.0));
        assert_eq!(result.unwrap().as_slice(), &[f64::INFINITY]);
        assert_eq!(faults, FaultFlags::DIVIDE_BY_ZERO);

        let (_, faults) = apply(BinaryOp::Divide, &IoBuffer::double(0.0), &IoBuffer::double(0.0));
        assert_eq!(faults, FaultFlags::INVALID);

        let (_, faults) = apply(BinaryOp::Power, &IoBuffer::double(0.0), &IoBuffer::double(-1.0));
        assert_eq!(faults, FaultFlags::DIVIDE_BY_ZERO);
    }

    #[test]
    fn test_min_max_atan2() {
        let (result, _) = apply(BinaryOp::Min, &vector(&[1.0, 5.0]), &IoBuffer::double(3.0));
        assert_eq!(result.unwrap().as_slice(), &[1.0, 3.0]);
        let (result, _) = apply(BinaryOp::Max, &vector(&[1.0, 5.0]), &IoBuffer::double(3.0));
        assert_eq!(result.unwrap().as_slice(), &[3.0, 5.0]);
        let (result, _) = apply(BinaryOp::Atan2, &IoBuffer::double(1.0), &IoBuffer::double(1.0));
        assert!((result.unwrap().as_slice()[0] - std::f64::consts::FRAC_PI_4).abs() < 1e-15);
    }
}
