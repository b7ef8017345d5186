//! Operator overloading and named operator builders.
//!
//! Functions compose with the usual Rust operators:
//!
//! - `+ - * /` build arithmetic nodes, with `f64` accepted on either side
//! - unary `-` negates, `!` is logical not
//! - `& | ^` build logical and/or/xor nodes
//!
//! Relational operators cannot be overloaded to return a Function, so they are
//! provided as methods (`less`, `less_equal`, `greater`, `greater_equal`).
//!
//! The named builders accept anything convertible through [`crate::convert`],
//! including `None`, and report a missing operand as an error rather than
//! building a node.

use std::ops::{Neg, Not};

use crate::convert::{self, operand, FnArg};
use crate::errors::ConvertError;
use crate::expr::{Function, NodeKind};
use crate::operators::{binary::BinaryOp, unary::UnaryOp};

macro_rules! impl_binary_operator {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<T: Into<Function>> std::ops::$trait<T> for Function {
            type Output = Function;

            fn $method(self, rhs: T) -> Function {
                Function::binary($op, self, rhs.into())
            }
        }

        impl<T: Into<Function>> std::ops::$trait<T> for &Function {
            type Output = Function;

            fn $method(self, rhs: T) -> Function {
                Function::binary($op, self.clone(), rhs.into())
            }
        }
    };
}

macro_rules! impl_scalar_lhs {
    ($trait:ident, $method:ident, $op:expr) => {
        impl std::ops::$trait<Function> for f64 {
            type Output = Function;

            fn $method(self, rhs: Function) -> Function {
                Function::binary($op, self.into(), rhs)
            }
        }

        impl std::ops::$trait<&Function> for f64 {
            type Output = Function;

            fn $method(self, rhs: &Function) -> Function {
                Function::binary($op, self.into(), rhs.clone())
            }
        }
    };
}

impl_binary_operator!(Add, add, BinaryOp::Add);
impl_binary_operator!(Sub, sub, BinaryOp::Subtract);
impl_binary_operator!(Mul, mul, BinaryOp::Multiply);
impl_binary_operator!(Div, div, BinaryOp::Divide);
impl_binary_operator!(BitAnd, bitand, BinaryOp::And);
impl_binary_operator!(BitOr, bitor, BinaryOp::Or);
impl_binary_operator!(BitXor, bitxor, BinaryOp::Xor);

impl_scalar_lhs!(Add, add, BinaryOp::Add);
impl_scalar_lhs!(Sub, sub, BinaryOp::Subtract);
impl_scalar_lhs!(Mul, mul, BinaryOp::Multiply);
impl_scalar_lhs!(Div, div, BinaryOp::Divide);

impl Neg for Function {
    type Output = Function;

    fn neg(self) -> Function {
        Function::unary(UnaryOp::Negate, self)
    }
}

impl Neg for &Function {
    type Output = Function;

    fn neg(self) -> Function {
        Function::unary(UnaryOp::Negate, self.clone())
    }
}

impl Not for Function {
    type Output = Function;

    fn not(self) -> Function {
        Function::unary(UnaryOp::Not, self)
    }
}

impl Not for &Function {
    type Output = Function;

    fn not(self) -> Function {
        Function::unary(UnaryOp::Not, self.clone())
    }
}

impl Function {
    /// Extracts logical component `index` as a scalar.
    ///
    /// Indices past the operand's width are reported when the graph is evaluated.
    pub fn at(&self, index: usize) -> Function {
        Function::from_kind(NodeKind::At {
            arg: self.clone(),
            index,
        })
    }

    pub fn less(&self, rhs: impl Into<Function>) -> Function {
        Function::binary(BinaryOp::Less, self.clone(), rhs.into())
    }

    pub fn less_equal(&self, rhs: impl Into<Function>) -> Function {
        Function::binary(BinaryOp::LessEqual, self.clone(), rhs.into())
    }

    pub fn greater(&self, rhs: impl Into<Function>) -> Function {
        Function::binary(BinaryOp::Greater, self.clone(), rhs.into())
    }

    pub fn greater_equal(&self, rhs: impl Into<Function>) -> Function {
        Function::binary(BinaryOp::GreaterEqual, self.clone(), rhs.into())
    }
}

/// The evaluation coordinate as a Function.
pub fn input() -> Function {
    Function::input()
}

/// Alias of [`input`].
pub fn coord() -> Function {
    Function::input()
}

/// Builds a constant node from a literal or a homogeneous literal collection.
///
/// The returned node is the only kind that supports [`Function::set_value`].
pub fn constant(value: impl Into<FnArg>) -> Result<Function, ConvertError> {
    convert::literal_buffer(value.into()).map(Function::constant_buffer)
}

fn binary(
    op: BinaryOp,
    lhs: impl Into<FnArg>,
    rhs: impl Into<FnArg>,
) -> Result<Function, ConvertError> {
    Ok(Function::binary(
        op,
        operand(op.name(), lhs)?,
        operand(op.name(), rhs)?,
    ))
}

/// `lhs + rhs`, with both operands converted first.
///
/// # Arguments
/// * `lhs` - Left operand; any value accepted by [`crate::convert::convert`]
/// * `rhs` - Right operand
///
/// # Returns
/// * `Ok(Function)` - The addition node
/// * `Err(ConvertError::NullOperand)` - Either operand converted to `None`
/// * `Err(ConvertError)` - Either operand could not be converted
pub fn add(lhs: impl Into<FnArg>, rhs: impl Into<FnArg>) -> Result<Function, ConvertError> {
    binary(BinaryOp::Add, lhs, rhs)
}

pub fn subtract(lhs: impl Into<FnArg>, rhs: impl Into<FnArg>) -> Result<Function, ConvertError> {
    binary(BinaryOp::Subtract, lhs, rhs)
}

pub fn multiply(lhs: impl Into<FnArg>, rhs: impl Into<FnArg>) -> Result<Function, ConvertError> {
    binary(BinaryOp::Multiply, lhs, rhs)
}

pub fn divide(lhs: impl Into<FnArg>, rhs: impl Into<FnArg>) -> Result<Function, ConvertError> {
    binary(BinaryOp::Divide, lhs, rhs)
}

pub fn less(lhs: impl Into<FnArg>, rhs: impl Into<FnArg>) -> Result<Function, ConvertError> {
    binary(BinaryOp::Less, lhs, rhs)
}

pub fn less_equal(lhs: impl Into<FnArg>, rhs: impl Into<FnArg>) -> Result<Function, ConvertError> {
    binary(BinaryOp::LessEqual, lhs, rhs)
}

pub fn greater(lhs: impl Into<FnArg>, rhs: impl Into<FnArg>) -> Result<Function, ConvertError> {
    binary(BinaryOp::Greater, lhs, rhs)
}

pub fn greater_equal(
    lhs: impl Into<FnArg>,
    rhs: impl Into<FnArg>,
) -> Result<Function, ConvertError> {
    binary(BinaryOp::GreaterEqual, lhs, rhs)
}

pub fn logical_and(lhs: impl Into<FnArg>, rhs: impl Into<FnArg>) -> Result<Function, ConvertError> {
    binary(BinaryOp::And, lhs, rhs)
}

pub fn logical_or(lhs: impl Into<FnArg>, rhs: impl Into<FnArg>) -> Result<Function, ConvertError> {
    binary(BinaryOp::Or, lhs, rhs)
}

pub fn logical_xor(lhs: impl Into<FnArg>, rhs: impl Into<FnArg>) -> Result<Function, ConvertError> {
    binary(BinaryOp::Xor, lhs, rhs)
}

pub fn logical_not(value: impl Into<FnArg>) -> Result<Function, ConvertError> {
    Ok(Function::unary(
        UnaryOp::Not,
        operand(UnaryOp::Not.name(), value)?,
    ))
}

/// Extracts component `n` of `value`.
///
/// # Returns
/// * `Err(ConvertError::NegativeComponent)` - `n` is negative
/// * `Err(ConvertError::NullOperand)` - `value` converted to `None`
pub fn at(value: impl Into<FnArg>, n: i64) -> Result<Function, ConvertError> {
    let index = usize::try_from(n).map_err(|_| ConvertError::NegativeComponent(n))?;
    Ok(operand("at", value)?.at(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::DataType;

    fn scalar(f: &Function, at: f64) -> f64 {
        f.evaluate(at).unwrap().values()[[0, 0]]
    }

    #[test]
    fn test_operator_overloading() {
        let x = input().at(0);
        assert_eq!(scalar(&(&x + 2.0), 3.0), 5.0);
        assert_eq!(scalar(&(&x - 2.0), 3.0), 1.0);
        assert_eq!(scalar(&(2.0 - &x), 3.0), -1.0);
        assert_eq!(scalar(&(&x * &x), 3.0), 9.0);
        assert_eq!(scalar(&(1.0 / x.clone()), 4.0), 0.25);
        assert_eq!(scalar(&-x, 4.0), -4.0);
    }

    #[test]
    fn test_commutativity() {
        let x = input().at(0);
        let a = x.clone() * 3.0 + 1.0;
        let b = x.sin();
        for p in [-1.5, 0.0, 0.25, 7.0] {
            assert_eq!(scalar(&(&a + &b), p), scalar(&(&b + &a), p));
            assert_eq!(scalar(&(&a * &b), p), scalar(&(&b * &a), p));
        }
    }

    #[test]
    fn test_relational_and_logical() {
        let x = input().at(0);
        let inside = x.greater(0.0) & x.less(1.0);
        let results = inside.evaluate(vec![vec![0.5], vec![1.5]]).unwrap();
        assert_eq!(results.dtype(), Some(DataType::Bool));
        assert_eq!(results.values().column(0).to_vec(), vec![1.0, 0.0]);

        let outside = !inside.clone();
        assert_eq!(scalar(&outside, 1.5), 1.0);
        let either = x.less_equal(0.0) | x.greater_equal(1.0);
        assert_eq!(scalar(&either, 1.0), 1.0);
        let one = x.less(1.0) ^ x.less(2.0);
        assert_eq!(scalar(&one, 1.5), 1.0);
    }

    #[test]
    fn test_named_builders() {
        let f = add(input().at(0), 1).unwrap();
        assert_eq!(scalar(&f, 2.0), 3.0);
        let f = divide(1.0, input().at(0)).unwrap();
        assert_eq!(scalar(&f, 2.0), 0.5);
        let f = logical_and(true, less(input().at(0), 1.0).unwrap()).unwrap();
        assert_eq!(scalar(&f, 0.0), 1.0);
        let f = logical_not(true).unwrap();
        assert_eq!(scalar(&f, 0.0), 0.0);

        assert!(matches!(
            add(None::<f64>, 1.0),
            Err(ConvertError::NullOperand("add"))
        ));
        assert!(matches!(
            logical_xor(true, None::<bool>),
            Err(ConvertError::NullOperand("logical_xor"))
        ));
    }

    #[test]
    fn test_at() {
        let v = constant((1.0, 2.0, 3.0)).unwrap();
        assert_eq!(scalar(&at(&v, 2).unwrap(), 0.0), 3.0);
        assert!(matches!(at(&v, -1), Err(ConvertError::NegativeComponent(-1))));
        assert!(matches!(at(None::<f64>, 0), Err(ConvertError::NullOperand("at"))));
        assert!(v.at(3).evaluate(0.0).is_err());
    }

    #[test]
    fn test_constant_rejects_functions() {
        assert!(constant(input()).is_err());
        assert_eq!(constant(2).unwrap().value().unwrap().dtype(), DataType::Int);
    }
}
