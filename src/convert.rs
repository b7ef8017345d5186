//! Conversion of literals, collections and existing Functions into graph nodes.
//!
//! Every operator and builder in the crate accepts its operands as
//! `impl Into<FnArg>` and routes them through [`convert`], so literals, tuples,
//! vectors and Functions can be mixed freely:
//!
//! - `None` converts to no Function at all
//! - an existing Function is returned unchanged (the same node, never re-wrapped)
//! - a bool, integer or float literal becomes a scalar constant of matching type
//! - a collection of literals sharing one type becomes a single vector constant
//! - a collection containing Functions becomes a vector composed component-wise,
//!   with literal elements converted individually
//!
//! Collections of mixed literal types, nested collections and empty collections
//! are rejected with a [`ConvertError`] naming the offending value.

use std::fmt;

use itertools::Itertools;

use crate::errors::ConvertError;
use crate::expr::Function;
use crate::io::{bool_to_f64, is_exact_int, DataType, IoBuffer, IoDescriptor, Values};

/// Any value accepted where a Function operand is expected.
#[derive(Clone, Debug)]
pub enum FnArg {
    None,
    Function(Function),
    Bool(bool),
    Int(i64),
    Float(f64),
    List(Vec<FnArg>),
}

impl FnArg {
    fn literal(&self) -> Result<Option<(DataType, f64)>, ConvertError> {
        Ok(match self {
            FnArg::Bool(v) => Some((DataType::Bool, bool_to_f64(*v))),
            FnArg::Int(v) if is_exact_int(*v) => Some((DataType::Int, *v as f64)),
            FnArg::Int(v) => return Err(ConvertError::IntOutOfRange(*v)),
            FnArg::Float(v) => Some((DataType::Double, *v)),
            _ => None,
        })
    }
}

/// Converts a value into a Function.
///
/// # Arguments
/// * `value` - A literal, a collection, an existing Function or `None`
///
/// # Returns
/// * `Ok(None)` - The input was `None`
/// * `Ok(Some(Function))` - The converted Function; an input Function is returned as is
/// * `Err(ConvertError)` - The value cannot be represented as a Function
///
/// # Example
/// ```
/// use fngraph::prelude::*;
///
/// assert!(convert(None::<f64>).unwrap().is_none());
///
/// let x = input().at(0);
/// let same = convert(&x).unwrap().unwrap();
/// assert!(same.ptr_eq(&x));
///
/// let v = convert((x, 1.0, 2.0)).unwrap().unwrap();
/// let row = v.evaluate(3.0).unwrap();
/// assert_eq!(row.values().row(0).to_vec(), vec![3.0, 1.0, 2.0]);
/// ```
pub fn convert(value: impl Into<FnArg>) -> Result<Option<Function>, ConvertError> {
    match value.into() {
        FnArg::None => Ok(None),
        other => to_function(other).map(Some),
    }
}

/// Converts an operand that must be present, naming `op` when it is not.
pub(crate) fn operand(op: &'static str, value: impl Into<FnArg>) -> Result<Function, ConvertError> {
    convert(value)?.ok_or(ConvertError::NullOperand(op))
}

fn to_function(arg: FnArg) -> Result<Function, ConvertError> {
    match arg {
        FnArg::Function(f) => Ok(f),
        FnArg::None => Err(ConvertError::NullOperand("convert")),
        FnArg::List(ref items) => match literal_list(items, &arg)? {
            Some(buffer) => Ok(Function::constant_buffer(buffer)),
            None => {
                let components = items
                    .iter()
                    .cloned()
                    .map(to_function)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Function::compose(components))
            }
        },
        scalar => literal_buffer(scalar).map(Function::constant_buffer),
    }
}

/// Converts a literal or literal collection into a value buffer.
///
/// Used for constant construction and for [`Function::set_value`].
pub(crate) fn literal_buffer(arg: FnArg) -> Result<IoBuffer, ConvertError> {
    if let Some((dtype, value)) = arg.literal()? {
        return Ok(IoBuffer::new(
            IoDescriptor::scalar(),
            dtype,
            smallvec::smallvec![value],
        ));
    }
    match &arg {
        FnArg::List(items) => {
            literal_list(items, &arg)?.ok_or_else(|| ConvertError::NotLiteral(arg.to_string()))
        }
        _ => Err(ConvertError::NotLiteral(arg.to_string())),
    }
}

/// Builds a vector buffer from a homogeneous literal collection.
///
/// Returns `Ok(None)` when the collection contains Functions and must be composed instead.
fn literal_list(items: &[FnArg], whole: &FnArg) -> Result<Option<IoBuffer>, ConvertError> {
    if items.is_empty() {
        return Err(ConvertError::EmptyCollection);
    }
    if items.iter().any(|item| matches!(item, FnArg::List(_))) {
        return Err(ConvertError::NestedCollection {
            value: whole.to_string(),
        });
    }
    if items.iter().any(|item| matches!(item, FnArg::None)) {
        return Err(ConvertError::NullOperand("convert"));
    }
    if items.iter().any(|item| matches!(item, FnArg::Function(_))) {
        return Ok(None);
    }

    let literals: Vec<(DataType, f64)> = items
        .iter()
        .map(FnArg::literal)
        .filter_map_ok(|literal| literal)
        .collect::<Result<_, _>>()?;
    let dtype = literals[0].0;
    if literals.iter().any(|(d, _)| *d != dtype) {
        return Err(ConvertError::Heterogeneous {
            value: whole.to_string(),
        });
    }
    let values: Values = literals.iter().map(|(_, v)| *v).collect();
    Ok(Some(IoBuffer::new(
        IoDescriptor::vector(values.len()),
        dtype,
        values,
    )))
}

impl fmt::Display for FnArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FnArg::None => write!(f, "None"),
            FnArg::Function(func) => write!(f, "{func}"),
            FnArg::Bool(v) => write!(f, "{v}"),
            FnArg::Int(v) => write!(f, "{v}"),
            FnArg::Float(v) => write!(f, "{v:?}"),
            FnArg::List(items) => write!(f, "[{}]", items.iter().join(", ")),
        }
    }
}

impl From<bool> for FnArg {
    fn from(value: bool) -> Self {
        FnArg::Bool(value)
    }
}

impl From<i32> for FnArg {
    fn from(value: i32) -> Self {
        FnArg::Int(value.into())
    }
}

impl From<i64> for FnArg {
    fn from(value: i64) -> Self {
        FnArg::Int(value)
    }
}

impl From<u32> for FnArg {
    fn from(value: u32) -> Self {
        FnArg::Int(value.into())
    }
}

impl From<f32> for FnArg {
    fn from(value: f32) -> Self {
        FnArg::Float(value.into())
    }
}

impl From<f64> for FnArg {
    fn from(value: f64) -> Self {
        FnArg::Float(value)
    }
}

impl From<Function> for FnArg {
    fn from(value: Function) -> Self {
        FnArg::Function(value)
    }
}

impl From<&Function> for FnArg {
    fn from(value: &Function) -> Self {
        FnArg::Function(value.clone())
    }
}

impl<T: Into<FnArg>> From<Option<T>> for FnArg {
    fn from(value: Option<T>) -> Self {
        value.map_or(FnArg::None, Into::into)
    }
}

impl<T: Into<FnArg>> From<Vec<T>> for FnArg {
    fn from(value: Vec<T>) -> Self {
        FnArg::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FnArg>, const N: usize> From<[T; N]> for FnArg {
    fn from(value: [T; N]) -> Self {
        FnArg::List(value.into_iter().map(Into::into).collect())
    }
}

impl<A: Into<FnArg>, B: Into<FnArg>> From<(A, B)> for FnArg {
    fn from((a, b): (A, B)) -> Self {
        FnArg::List(vec![a.into(), b.into()])
    }
}

impl<A: Into<FnArg>, B: Into<FnArg>, C: Into<FnArg>> From<(A, B, C)> for FnArg {
    fn from((a, b, c): (A, B, C)) -> Self {
        FnArg::List(vec![a.into(), b.into(), c.into()])
    }
}

impl From<f64> for Function {
    fn from(value: f64) -> Self {
        Function::constant_buffer(IoBuffer::double(value))
    }
}

impl TryFrom<i64> for Function {
    type Error = ConvertError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        IoBuffer::try_int(value)
            .map(Function::constant_buffer)
            .ok_or(ConvertError::IntOutOfRange(value))
    }
}

impl From<i32> for Function {
    fn from(value: i32) -> Self {
        Function::constant_buffer(IoBuffer::int(value))
    }
}

impl From<bool> for Function {
    fn from(value: bool) -> Self {
        Function::constant_buffer(IoBuffer::boolean(value))
    }
}

impl From<&Function> for Function {
    fn from(value: &Function) -> Self {
        value.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::input;

    #[test]
    fn test_convert_none_and_identity() {
        assert!(convert(FnArg::None).unwrap().is_none());
        assert!(convert(None::<Function>).unwrap().is_none());

        let f = input().at(0) + 1.0;
        let converted = convert(f.clone()).unwrap().unwrap();
        assert!(converted.ptr_eq(&f));
    }

    #[test]
    fn test_convert_scalars() {
        let cases = [
            (FnArg::from(true), DataType::Bool, 1.0),
            (FnArg::from(3), DataType::Int, 3.0),
            (FnArg::from(2.5), DataType::Double, 2.5),
        ];
        for (arg, dtype, expected) in cases {
            let value = convert(arg).unwrap().unwrap().value().unwrap();
            assert_eq!(value.dtype(), dtype);
            assert_eq!(value.descriptor(), IoDescriptor::scalar());
            assert_eq!(value.as_slice(), &[expected]);
        }
    }

    #[test]
    fn test_convert_homogeneous_collection() {
        let f = convert((1.0, 2.0, 3.0)).unwrap().unwrap();
        assert!(f.is_constant());
        let value = f.value().unwrap();
        assert_eq!(value.descriptor(), IoDescriptor::vector(3));
        assert_eq!(value.as_slice(), &[1.0, 2.0, 3.0]);

        let f = convert(vec![true, false]).unwrap().unwrap();
        assert_eq!(f.value().unwrap().dtype(), DataType::Bool);
    }

    #[test]
    fn test_convert_rejects_bad_collections() {
        assert!(matches!(
            convert((1, 2.0)),
            Err(ConvertError::Heterogeneous { .. })
        ));
        assert!(matches!(
            convert(Vec::<f64>::new()),
            Err(ConvertError::EmptyCollection)
        ));
        assert!(matches!(
            convert(vec![vec![1.0], vec![2.0]]),
            Err(ConvertError::NestedCollection { .. })
        ));
        assert!(matches!(
            convert((1.0, None::<f64>)),
            Err(ConvertError::NullOperand(_))
        ));

        let err = convert((1, 2.0)).unwrap_err();
        assert!(err.to_string().contains("[1, 2.0]"));
    }

    #[test]
    fn test_convert_int_range() {
        use crate::io::MAX_EXACT_INT;

        for value in [0, -7, MAX_EXACT_INT, -MAX_EXACT_INT] {
            let results = convert(value).unwrap().unwrap().evaluate(0.0).unwrap();
            assert_eq!(results.dtype(), Some(DataType::Int));
            assert_eq!(results.values()[[0, 0]] as i64, value);
        }

        for value in [MAX_EXACT_INT + 1, i64::MAX, i64::MIN] {
            assert!(matches!(
                convert(value),
                Err(ConvertError::IntOutOfRange(v)) if v == value
            ));
            assert!(matches!(
                Function::try_from(value),
                Err(ConvertError::IntOutOfRange(_))
            ));
        }
        assert!(matches!(
            convert((1i64, MAX_EXACT_INT + 1)),
            Err(ConvertError::IntOutOfRange(_))
        ));
        assert!(matches!(
            literal_buffer(FnArg::from(i64::MAX)),
            Err(ConvertError::IntOutOfRange(_))
        ));
    }

    #[test]
    fn test_convert_mixed_collection() {
        let x = input().at(0);
        let f = convert((x.clone() * 2.0, 1, x.clone() + 1.0)).unwrap().unwrap();
        assert!(!f.is_constant());

        let results = f.evaluate(vec![vec![1.0], vec![2.0]]).unwrap();
        assert_eq!(results.shape(), (2, 3));
        assert_eq!(results.values().row(0).to_vec(), vec![2.0, 1.0, 2.0]);
        assert_eq!(results.values().row(1).to_vec(), vec![4.0, 1.0, 3.0]);
    }

    #[test]
    fn test_literal_buffer_rejects_functions() {
        assert!(matches!(
            literal_buffer(FnArg::from(input())),
            Err(ConvertError::NotLiteral(_))
        ));
        assert!(matches!(
            literal_buffer(FnArg::from((input(), 1.0))),
            Err(ConvertError::NotLiteral(_))
        ));
    }
}
