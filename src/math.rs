//! Transcendental and tensor functions.
//!
//! Every unary function exists both as a free function taking any convertible
//! value and as a method on [`Function`]. The free functions treat `None` as
//! the evaluation coordinate, so `math::sin(None::<f64>)` is `sin(input())`.
//!
//! ```
//! use fngraph::prelude::*;
//!
//! let x = input().at(0);
//! let f = math::sqrt(math::pow(&x, 2).unwrap() + 16.0).unwrap();
//! assert_eq!(f.evaluate(3.0).unwrap().values()[[0, 0]], 5.0);
//! ```

use crate::convert::{convert, operand, FnArg};
use crate::errors::ConvertError;
use crate::expr::{Function, NodeKind};
use crate::operators::{binary::BinaryOp, unary::UnaryOp};

macro_rules! unary_functions {
    ($($(#[$doc:meta])* $name:ident => $op:expr),* $(,)?) => {
        $(
            $(#[$doc])*
            pub fn $name(value: impl Into<FnArg>) -> Result<Function, ConvertError> {
                let arg = convert(value)?.unwrap_or_else(Function::input);
                Ok(Function::unary($op, arg))
            }
        )*

        impl Function {
            $(
                $(#[$doc])*
                pub fn $name(&self) -> Function {
                    Function::unary($op, self.clone())
                }
            )*
        }
    };
}

unary_functions! {
    /// Sine, argument in radians.
    sin => UnaryOp::Sin,
    /// Cosine, argument in radians.
    cos => UnaryOp::Cos,
    /// Tangent, argument in radians.
    tan => UnaryOp::Tan,
    asin => UnaryOp::Asin,
    acos => UnaryOp::Acos,
    atan => UnaryOp::Atan,
    sinh => UnaryOp::Sinh,
    cosh => UnaryOp::Cosh,
    tanh => UnaryOp::Tanh,
    asinh => UnaryOp::Asinh,
    acosh => UnaryOp::Acosh,
    atanh => UnaryOp::Atanh,
    /// Natural exponential.
    exp => UnaryOp::Exp,
    /// Natural logarithm.
    log => UnaryOp::Log,
    log2 => UnaryOp::Log2,
    log10 => UnaryOp::Log10,
    sqrt => UnaryOp::Sqrt,
    /// Gauss error function.
    erf => UnaryOp::Erf,
    /// Complementary error function, `1 - erf(x)` without cancellation for large `x`.
    erfc => UnaryOp::Erfc,
    /// Absolute value; integer operands stay integers.
    abs => UnaryOp::Abs,
}

/// Integer literal exponents are promoted to floating point.
fn exponent(value: impl Into<FnArg>) -> FnArg {
    match value.into() {
        FnArg::Int(i) => FnArg::Float(i as f64),
        other => other,
    }
}

/// Raises `base` to `exponent` with IEEE `pow` semantics.
///
/// # Arguments
/// * `base` - The base; any convertible value
/// * `exponent_value` - The exponent; integer literals are promoted to floats
///
/// # Returns
/// A Double-valued Function, or `NullOperand` when either argument is `None`.
pub fn pow(base: impl Into<FnArg>, exponent_value: impl Into<FnArg>) -> Result<Function, ConvertError> {
    Ok(Function::binary(
        BinaryOp::Power,
        operand("pow", base)?,
        operand("pow", exponent(exponent_value))?,
    ))
}

/// Four-quadrant arctangent of `y / x`.
pub fn atan2(y: impl Into<FnArg>, x: impl Into<FnArg>) -> Result<Function, ConvertError> {
    Ok(Function::binary(
        BinaryOp::Atan2,
        operand("atan2", y)?,
        operand("atan2", x)?,
    ))
}

/// Elementwise minimum.
pub fn min(a: impl Into<FnArg>, b: impl Into<FnArg>) -> Result<Function, ConvertError> {
    Ok(Function::binary(BinaryOp::Min, operand("min", a)?, operand("min", b)?))
}

/// Elementwise maximum.
pub fn max(a: impl Into<FnArg>, b: impl Into<FnArg>) -> Result<Function, ConvertError> {
    Ok(Function::binary(BinaryOp::Max, operand("max", a)?, operand("max", b)?))
}

/// Inner product of two vector-valued operands.
///
/// Both operands must evaluate to the same width; a mismatch is reported as a
/// `ShapeMismatch` when the graph is evaluated.
///
/// # Example
/// ```
/// use fngraph::prelude::*;
///
/// let d = math::dot((1.0, 2.0, 3.0), (4.0, 5.0, 6.0)).unwrap();
/// assert_eq!(d.evaluate(0.0).unwrap().values()[[0, 0]], 32.0);
/// ```
pub fn dot(lhs: impl Into<FnArg>, rhs: impl Into<FnArg>) -> Result<Function, ConvertError> {
    Ok(operand("dot", lhs)?.dot(operand("dot", rhs)?))
}

impl Function {
    /// `self ^ exponent`; see [`pow`].
    pub fn pow(&self, exponent_value: impl Into<Function>) -> Function {
        Function::binary(BinaryOp::Power, self.clone(), exponent_value.into())
    }

    pub fn dot(&self, rhs: impl Into<Function>) -> Function {
        Function::from_kind(NodeKind::Dot {
            lhs: self.clone(),
            rhs: rhs.into(),
        })
    }

    pub fn atan2(&self, x: impl Into<Function>) -> Function {
        Function::binary(BinaryOp::Atan2, self.clone(), x.into())
    }

    pub fn min(&self, other: impl Into<Function>) -> Function {
        Function::binary(BinaryOp::Min, self.clone(), other.into())
    }

    pub fn max(&self, other: impl Into<Function>) -> Function {
        Function::binary(BinaryOp::Max, self.clone(), other.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EvaluationError;
    use crate::io::DataType;
    use crate::ops::{constant, input};

    fn scalar(f: &Function, at: f64) -> f64 {
        f.evaluate(at).unwrap().values()[[0, 0]]
    }

    #[test]
    fn test_unary_free_and_method() {
        let x = input().at(0);
        assert_eq!(scalar(&sin(&x).unwrap(), 0.5), 0.5f64.sin());
        assert_eq!(scalar(&x.cos(), 0.5), 0.5f64.cos());
        assert_eq!(scalar(&exp(1.0).unwrap(), 0.0), 1.0f64.exp());
        assert_eq!(scalar(&log10(&x).unwrap(), 100.0), 2.0);
        assert_eq!(scalar(&x.abs(), -2.5), 2.5);
    }

    #[test]
    fn test_unary_defaults_to_input() {
        let f = sqrt(None::<f64>).unwrap();
        assert_eq!(f.to_string(), "sqrt(input)");
        assert_eq!(scalar(&f, 9.0), 3.0);
    }

    #[test]
    fn test_pow_zero_exponent() {
        let x = input().at(0);
        for p in [-3.0, 0.5, 2.0, 1e10] {
            let f = pow(&x, 0).unwrap();
            assert_eq!(scalar(&f, p), 1.0);
        }
        let f = pow(&x, 2).unwrap();
        assert_eq!(f.evaluate(3.0).unwrap().dtype(), Some(DataType::Double));
        assert_eq!(scalar(&x.pow(0.5), 16.0), 4.0);
        assert!(matches!(pow(None::<f64>, 2), Err(ConvertError::NullOperand("pow"))));
    }

    #[test]
    fn test_dot() {
        let a = [1.5, -2.0, 4.0];
        let b = [2.0, 0.5, 0.25];
        let expected: f64 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        let f = dot(a, b).unwrap();
        assert_eq!(scalar(&f, 0.0), expected);

        let f = input().dot(constant((1.0, 1.0)).unwrap());
        assert_eq!(f.evaluate(vec![2.0, 3.0]).unwrap().values()[[0, 0]], 5.0);
        assert!(matches!(
            f.evaluate(vec![2.0, 3.0, 4.0]),
            Err(EvaluationError::ShapeMismatch { op: "dot", .. })
        ));
    }

    #[test]
    fn test_min_max_atan2() {
        let x = input().at(0);
        assert_eq!(scalar(&min(&x, 1.0).unwrap(), 3.0), 1.0);
        assert_eq!(scalar(&max(&x, 1.0).unwrap(), 3.0), 3.0);
        assert_eq!(scalar(&x.min(0.0), -1.0), -1.0);
        assert_eq!(scalar(&atan2(&x, 0.0).unwrap(), 1.0), std::f64::consts::FRAC_PI_2);
    }
}
