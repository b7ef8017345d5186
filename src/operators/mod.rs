//! Pointwise operator kernels.
//!
//! Each kernel takes already evaluated operand buffers for a single point,
//! checks their types and widths, applies the scalar operation component by
//! component and records any floating point faults in the evaluation context.
//!
//! - `unary`: negation, logical not and the transcendental set
//! - `binary`: arithmetic, relational and logical operators plus min/max/atan2
//! - `dot`: inner product of two equal width operands

pub mod binary;
pub mod unary;

use crate::errors::EvaluationError;
use crate::expr::EvalContext;
use crate::faults::{FaultFlags, Probe};
use crate::io::{fits_exact_int, DataType, IoBuffer, IoDescriptor};

/// Inner product of two equal width numeric operands.
///
/// Widths must match exactly; unlike arithmetic there is no scalar broadcasting.
pub(crate) fn dot(
    lhs: &IoBuffer,
    rhs: &IoBuffer,
    ctx: &mut EvalContext,
) -> Result<IoBuffer, EvaluationError> {
    require_numeric("dot", lhs)?;
    require_numeric("dot", rhs)?;
    if lhs.width() != rhs.width() {
        return Err(EvaluationError::ShapeMismatch {
            op: "dot",
            left: lhs.descriptor(),
            right: rhs.descriptor(),
        });
    }

    let mut sum = 0.0;
    for (a, b) in lhs.as_slice().iter().zip(rhs.as_slice()) {
        let product = a * b;
        ctx.record(FaultFlags::probe(&[*a, *b], product, Probe::Shrinking));
        let next = sum + product;
        ctx.record(FaultFlags::probe(&[sum, product], next, Probe::Exact));
        sum = next;
    }

    let dtype = match (lhs.dtype(), rhs.dtype()) {
        (DataType::Int, DataType::Int) if fits_exact_int(sum) => DataType::Int,
        _ => DataType::Double,
    };
    Ok(IoBuffer::new(
        IoDescriptor::scalar(),
        dtype,
        smallvec::smallvec![sum],
    ))
}

pub(crate) fn require_numeric(op: &'static str, value: &IoBuffer) -> Result<(), EvaluationError> {
    if value.dtype().is_numeric() {
        Ok(())
    } else {
        Err(EvaluationError::TypeMismatch {
            op,
            expected: "a numeric (int or double) operand",
            got: value.dtype(),
        })
    }
}

pub(crate) fn require_bool(op: &'static str, value: &IoBuffer) -> Result<(), EvaluationError> {
    if value.dtype() == DataType::Bool {
        Ok(())
    } else {
        Err(EvaluationError::TypeMismatch {
            op,
            expected: "a bool operand",
            got: value.dtype(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::IoKind;

    #[test]
    fn test_dot() {
        let mut ctx = EvalContext::default();
        let a = IoBuffer::from_slice(IoKind::Vector, &[2.0, 3.0, 4.0]).unwrap();
        let b = IoBuffer::from_slice(IoKind::Vector, &[5.0, 6.0, 7.0]).unwrap();
        let result = dot(&a, &b, &mut ctx).unwrap();
        assert_eq!(result.as_slice(), &[56.0]);
        assert_eq!(result.descriptor(), IoDescriptor::scalar());
    }

    #[test]
    fn test_dot_int_range() {
        let mut ctx = EvalContext::default();
        let ints = |values: [f64; 2]| {
            IoBuffer::new(IoDescriptor::vector(2), DataType::Int, values.into_iter().collect())
        };
        let result = dot(&ints([2.0, 3.0]), &ints([4.0, 5.0]), &mut ctx).unwrap();
        assert_eq!(result.dtype(), DataType::Int);
        assert_eq!(result.as_int(), Some(23));

        let wide = ints([3_037_000_500.0, 1.0]);
        let result = dot(&wide, &wide, &mut ctx).unwrap();
        assert_eq!(result.dtype(), DataType::Double);
    }

    #[test]
    fn test_dot_width_mismatch() {
        let mut ctx = EvalContext::default();
        let a = IoBuffer::from_slice(IoKind::Vector, &[2.0, 3.0, 4.0]).unwrap();
        let b = IoBuffer::from_slice(IoKind::Vector, &[5.0, 6.0]).unwrap();
        assert!(matches!(
            dot(&a, &b, &mut ctx),
            Err(EvaluationError::ShapeMismatch { op: "dot", .. })
        ));
    }

    #[test]
    fn test_dot_rejects_bool() {
        let mut ctx = EvalContext::default();
        let a = IoBuffer::boolean(true);
        let b = IoBuffer::double(1.0);
        assert!(matches!(
            dot(&a, &b, &mut ctx),
            Err(EvaluationError::TypeMismatch { .. })
        ));
    }
}
