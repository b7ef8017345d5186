//! Piecewise Functions: keyed dispatch and ordered guarded clauses.
//!
//! - [`map`] evaluates an integer key per point and dispatches to the Function
//!   registered for that key, falling back to an optional default
//! - [`conditional`] walks `(condition, result)` clauses in order and evaluates
//!   the result of the first condition that holds
//!
//! Both resolve every evaluation point independently. A point that selects no
//! branch is an [`EvaluationError::UnmatchedBranch`], never a silent fallback.

use std::collections::BTreeMap;
use std::fmt;

use itertools::Itertools;
use log::trace;

use crate::convert::{operand, FnArg};
use crate::errors::{ConvertError, EvaluationError};
use crate::expr::{EvalContext, Function, NodeKind};
use crate::input::EvalPoint;
use crate::io::{is_exact_int, DataType, IoBuffer, IoDescriptor};

/// Integer keyed dispatch table of a `map` node.
pub(crate) struct MapTable {
    key: Function,
    entries: BTreeMap<u64, Function>,
    default: Option<Function>,
}

impl MapTable {
    pub(crate) fn children(&self) -> Vec<&Function> {
        std::iter::once(&self.key)
            .chain(self.entries.values())
            .chain(self.default.as_ref())
            .collect()
    }

    pub(crate) fn evaluate(
        &self,
        point: &EvalPoint,
        ctx: &mut EvalContext,
    ) -> Result<IoBuffer, EvaluationError> {
        let key = self.key.eval_point(point, ctx)?;
        if !key.descriptor().is_scalar() {
            return Err(EvaluationError::ShapeMismatch {
                op: "map",
                left: IoDescriptor::scalar(),
                right: key.descriptor(),
            });
        }
        let key = key.as_int().ok_or(EvaluationError::TypeMismatch {
            op: "map",
            expected: "an integer or bool key",
            got: key.dtype(),
        })?;

        let branch = u64::try_from(key)
            .ok()
            .and_then(|k| self.entries.get(&k))
            .or(self.default.as_ref());
        match branch {
            Some(function) => {
                trace!("map key {key} dispatched to {function}");
                function.eval_point(point, ctx)
            }
            None => Err(EvaluationError::UnmatchedBranch(format!(
                "map key {key} is not one of [{}] and no default was given",
                self.entries.keys().join(", ")
            ))),
        }
    }
}

impl fmt::Display for MapTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self
            .entries
            .iter()
            .map(|(k, v)| format!("{k} => {v}"))
            .join(", ");
        write!(f, "map({}; {entries}", self.key)?;
        if let Some(default) = &self.default {
            write!(f, "; default => {default}")?;
        }
        write!(f, ")")
    }
}

/// One `(condition, result)` pair of a `conditional` node.
pub(crate) struct Clause {
    condition: Function,
    result: Function,
}

impl Clause {
    pub(crate) fn condition(&self) -> &Function {
        &self.condition
    }

    pub(crate) fn result(&self) -> &Function {
        &self.result
    }
}

pub(crate) fn evaluate_clauses(
    clauses: &[Clause],
    point: &EvalPoint,
    ctx: &mut EvalContext,
) -> Result<IoBuffer, EvaluationError> {
    for (i, clause) in clauses.iter().enumerate() {
        let condition = clause.condition.eval_point(point, ctx)?;
        if condition.dtype() != DataType::Bool {
            return Err(EvaluationError::TypeMismatch {
                op: "conditional",
                expected: "a bool condition",
                got: condition.dtype(),
            });
        }
        match condition.as_bool() {
            Some(true) => {
                trace!("conditional clause {i} selected");
                return clause.result.eval_point(point, ctx);
            }
            Some(false) => continue,
            None => {
                return Err(EvaluationError::ShapeMismatch {
                    op: "conditional",
                    left: IoDescriptor::scalar(),
                    right: condition.descriptor(),
                })
            }
        }
    }
    Err(EvaluationError::UnmatchedBranch(format!(
        "none of the {} conditional clause(s) holds at {:?}",
        clauses.len(),
        point.coord().as_slice()
    )))
}

/// Builds a keyed dispatch Function.
///
/// # Arguments
/// * `fn_key` - Function (or literal) producing an integer or bool key per point
/// * `mapping` - `(key, value)` pairs; keys must be non-negative and values convertible
/// * `fn_default` - Value used for keys absent from `mapping`, or `None`
///
/// # Returns
/// * `Ok(Function)` - The dispatch node
/// * `Err(ConvertError::NegativeMapKey)` - A key in `mapping` is negative
/// * `Err(ConvertError)` - The key or a mapped value could not be converted
///
/// # Example
/// ```
/// use fngraph::prelude::*;
///
/// let material = input().at(0);
/// let density = branching::map(
///     &material,
///     [(0, 1000.0), (1, 2700.0)],
///     None::<f64>,
/// )
/// .unwrap();
/// let rho = density.evaluate(vec![vec![0], vec![1]]).unwrap();
/// assert_eq!(rho.values().column(0).to_vec(), vec![1000.0, 2700.0]);
/// assert!(density.evaluate(vec![2]).is_err());
/// ```
pub fn map<K, V>(
    fn_key: impl Into<FnArg>,
    mapping: impl IntoIterator<Item = (K, V)>,
    fn_default: impl Into<FnArg>,
) -> Result<Function, ConvertError>
where
    K: Into<i64>,
    V: Into<FnArg>,
{
    let key = operand("map", fn_key)?;
    let mut entries = BTreeMap::new();
    for (k, v) in mapping {
        let key_value: i64 = k.into();
        let k = u64::try_from(key_value)
            .map_err(|_| ConvertError::NegativeMapKey(key_value))?;
        if !is_exact_int(key_value) {
            return Err(ConvertError::IntOutOfRange(key_value));
        }
        entries.insert(k, operand("map", v)?);
    }
    let default = crate::convert::convert(fn_default)?;
    Ok(Function::from_kind(NodeKind::Map(MapTable {
        key,
        entries,
        default,
    })))
}

/// Builds a Function selecting the result of the first clause whose condition holds.
///
/// Conditions must evaluate to scalar bools. A trailing `(true, value)` clause acts
/// as the default; without one, points satisfying no condition fail with
/// `UnmatchedBranch`.
///
/// # Example
/// ```
/// use fngraph::prelude::*;
///
/// let x = input().at(0);
/// let step = branching::conditional([(x.less(1.0), 1.0), (Function::from(true), 0.0)]).unwrap();
/// assert_eq!(step.evaluate(0.5).unwrap().values()[[0, 0]], 1.0);
/// assert_eq!(step.evaluate(2.0).unwrap().values()[[0, 0]], 0.0);
/// ```
pub fn conditional<C, R>(
    clauses: impl IntoIterator<Item = (C, R)>,
) -> Result<Function, ConvertError>
where
    C: Into<FnArg>,
    R: Into<FnArg>,
{
    let clauses = clauses
        .into_iter()
        .map(|(condition, result)| {
            Ok(Clause {
                condition: operand("conditional", condition)?,
                result: operand("conditional", result)?,
            })
        })
        .collect::<Result<Vec<_>, ConvertError>>()?;
    if clauses.is_empty() {
        return Err(ConvertError::EmptyClauses);
    }
    Ok(Function::from_kind(NodeKind::Conditional(clauses)))
}
