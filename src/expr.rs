//! Function graph nodes and the evaluation visitor.
//!
//! A [`Function`] is a cheap, clonable handle to an immutable node in a
//! directed acyclic graph. Composition never mutates existing nodes: every
//! operator builds a new node holding shared references to its operands, so a
//! sub-expression may be reused by any number of parents.
//!
//! Node kinds:
//! - Leaves: constants, the evaluation coordinate (`input`) and external
//!   [`FieldSource`] data items
//! - Elementwise operators: unary and binary, see [`crate::operators`]
//! - Structural nodes: component extraction, dot product, vector composition
//! - Control nodes: keyed `map` dispatch, ordered `conditional` clauses
//! - Wrappers: `SafeMaths` fault guards and `min_max` recording views
//!
//! The only mutation allowed anywhere in a graph is [`Function::set_value`] on a
//! constant leaf. External code holding a constant sees every later evaluation
//! pick up the replaced value.
//!
//! Evaluation is a single recursive match over [`NodeKind`] against one
//! [`EvalPoint`]; batch evaluation lives in [`crate::query`].

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use smallvec::smallvec;

use crate::branching::{self, Clause, MapTable};
use crate::convert::{self, FnArg};
use crate::errors::{ConvertError, EvaluationError};
use crate::faults::FaultFlags;
use crate::field::FieldSource;
use crate::input::EvalPoint;
use crate::io::{DataType, IoBuffer, IoDescriptor, IoKind};
use crate::operators::{self, binary::BinaryOp, unary::UnaryOp};
use crate::safe;
use crate::view::Recorder;

/// Per-evaluation scratch state threaded through the visitor.
///
/// Holds the floating point fault flags raised so far. Flags only accumulate;
/// `SafeMaths` brackets its child by swapping them out and back in.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    faults: FaultFlags,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fault flags raised since this context was created or last swapped.
    pub fn faults(&self) -> FaultFlags {
        self.faults
    }

    pub(crate) fn record(&mut self, flags: FaultFlags) {
        self.faults |= flags;
    }

    /// Replaces the current flags, returning the previous ones.
    pub(crate) fn swap_faults(&mut self, flags: FaultFlags) -> FaultFlags {
        std::mem::replace(&mut self.faults, flags)
    }
}

/// Constant leaf holding a value buffer that can be replaced in place.
pub(crate) struct Constant {
    value: RwLock<IoBuffer>,
}

impl Constant {
    fn read(&self) -> IoBuffer {
        self.value.read().clone()
    }
}

pub(crate) enum NodeKind {
    Constant(Constant),
    Input,
    Field(Arc<dyn FieldSource>),
    Unary {
        op: UnaryOp,
        arg: Function,
    },
    Binary {
        op: BinaryOp,
        lhs: Function,
        rhs: Function,
    },
    At {
        arg: Function,
        index: usize,
    },
    Dot {
        lhs: Function,
        rhs: Function,
    },
    Compose(Vec<Function>),
    Map(MapTable),
    Conditional(Vec<Clause>),
    Safe {
        arg: Function,
        mask: FaultFlags,
    },
    MinMax(Recorder),
}

impl NodeKind {
    fn children(&self) -> Vec<&Function> {
        match self {
            NodeKind::Constant(_) | NodeKind::Input | NodeKind::Field(_) => Vec::new(),
            NodeKind::Unary { arg, .. } | NodeKind::At { arg, .. } | NodeKind::Safe { arg, .. } => {
                vec![arg]
            }
            NodeKind::Binary { lhs, rhs, .. } | NodeKind::Dot { lhs, rhs } => vec![lhs, rhs],
            NodeKind::Compose(items) => items.iter().collect(),
            NodeKind::Map(table) => table.children(),
            NodeKind::Conditional(clauses) => clauses
                .iter()
                .flat_map(|clause| [clause.condition(), clause.result()])
                .collect(),
            NodeKind::MinMax(recorder) => recorder.children(),
        }
    }
}

pub(crate) struct Node {
    kind: NodeKind,
    /// Non-owning registry of the external data items reachable from this node.
    data_items: Vec<Weak<dyn FieldSource>>,
}

/// Handle to a node of a Function graph.
///
/// Cloning a `Function` clones the handle, not the graph: both handles refer to
/// the same node. Use [`Function::ptr_eq`] to test node identity.
///
/// # Example
/// ```
/// use fngraph::prelude::*;
///
/// let x = input().at(0);
/// let f = (x.clone() * 2.0 + 1.0).sin();
/// let results = f.evaluate(vec![vec![0.0], vec![0.5]]).unwrap();
/// assert_eq!(results.shape(), (2, 1));
/// assert_eq!(results.values()[[0, 0]], 1.0f64.sin());
/// ```
#[derive(Clone)]
pub struct Function {
    node: Arc<Node>,
}

impl Function {
    /// Builds a new node, collecting the data item registry from its children.
    pub(crate) fn from_kind(kind: NodeKind) -> Self {
        let mut data_items: Vec<Weak<dyn FieldSource>> = Vec::new();
        let mut register = |item: Weak<dyn FieldSource>| {
            if !data_items.iter().any(|known| Weak::ptr_eq(known, &item)) {
                data_items.push(item);
            }
        };
        if let NodeKind::Field(source) = &kind {
            register(Arc::downgrade(source));
        }
        for child in kind.children() {
            for item in &child.node.data_items {
                register(item.clone());
            }
        }
        Self {
            node: Arc::new(Node { kind, data_items }),
        }
    }

    pub(crate) fn kind(&self) -> &NodeKind {
        &self.node.kind
    }

    pub(crate) fn constant_buffer(value: IoBuffer) -> Self {
        Self::from_kind(NodeKind::Constant(Constant {
            value: RwLock::new(value),
        }))
    }

    pub(crate) fn unary(op: UnaryOp, arg: Function) -> Self {
        Self::from_kind(NodeKind::Unary { op, arg })
    }

    pub(crate) fn binary(op: BinaryOp, lhs: Function, rhs: Function) -> Self {
        Self::from_kind(NodeKind::Binary { op, lhs, rhs })
    }

    /// A leaf returning the evaluation coordinate itself.
    pub fn input() -> Self {
        Self::from_kind(NodeKind::Input)
    }

    /// A leaf backed by an external data item such as a mesh or swarm variable.
    pub fn field(source: Arc<dyn FieldSource>) -> Self {
        Self::from_kind(NodeKind::Field(source))
    }

    /// Vector composed component-wise from width-1 Functions.
    pub(crate) fn compose(items: Vec<Function>) -> Self {
        Self::from_kind(NodeKind::Compose(items))
    }

    /// Returns true when both handles refer to the same node.
    pub fn ptr_eq(&self, other: &Function) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind(), NodeKind::Constant(_))
    }

    /// Current value of a constant node, `None` for any other node.
    pub fn value(&self) -> Option<IoBuffer> {
        match self.kind() {
            NodeKind::Constant(constant) => Some(constant.read()),
            _ => None,
        }
    }

    /// Replaces the value held by a constant node.
    ///
    /// Every graph referencing this node observes the new value on its next
    /// evaluation. This is the only in-place mutation a graph supports.
    ///
    /// # Arguments
    /// * `value` - A literal or homogeneous literal collection with the same
    ///   descriptor and data type as the current value
    ///
    /// # Returns
    /// * `Ok(())` - The value was replaced
    /// * `Err(ConvertError::NotConstant)` - This node is not a constant
    /// * `Err(ConvertError::ConstantMismatch)` - Shape or type differ from the current value
    ///
    /// # Example
    /// ```
    /// use fngraph::prelude::*;
    ///
    /// let c = constant(2.0).unwrap();
    /// let f = input().at(0) * &c;
    /// assert_eq!(f.evaluate(3.0).unwrap().values()[[0, 0]], 6.0);
    ///
    /// c.set_value(4.0).unwrap();
    /// assert_eq!(f.evaluate(3.0).unwrap().values()[[0, 0]], 12.0);
    /// assert!(c.set_value((1.0, 2.0)).is_err());
    /// ```
    pub fn set_value(&self, value: impl Into<FnArg>) -> Result<(), ConvertError> {
        let NodeKind::Constant(constant) = self.kind() else {
            return Err(ConvertError::NotConstant);
        };
        let replacement = convert::literal_buffer(value.into())?;

        let mut current = constant.value.write();
        if replacement.descriptor() != current.descriptor() || replacement.dtype() != current.dtype()
        {
            return Err(ConvertError::ConstantMismatch {
                expected: current.descriptor(),
                expected_dtype: current.dtype(),
                got: replacement.descriptor(),
                got_dtype: replacement.dtype(),
            });
        }
        *current = replacement;
        Ok(())
    }

    /// External data items referenced anywhere below this node that are still alive.
    pub fn underlying_data_items(&self) -> Vec<Arc<dyn FieldSource>> {
        self.node
            .data_items
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Evaluates this node at a single point.
    ///
    /// # Arguments
    /// * `point` - The evaluation coordinate and its optional discretisation context
    /// * `ctx` - Scratch state receiving floating point fault flags
    ///
    /// # Returns
    /// The value at `point`, or the first error raised anywhere in the graph.
    pub fn eval_point(
        &self,
        point: &EvalPoint,
        ctx: &mut EvalContext,
    ) -> Result<IoBuffer, EvaluationError> {
        match self.kind() {
            NodeKind::Constant(constant) => Ok(constant.read()),
            NodeKind::Input => Ok(point.coord().clone()),
            NodeKind::Field(source) => source.evaluate_at(point, ctx),
            NodeKind::Unary { op, arg } => {
                let value = arg.eval_point(point, ctx)?;
                op.apply(&value, ctx)
            }
            NodeKind::Binary { op, lhs, rhs } => {
                let left = lhs.eval_point(point, ctx)?;
                let right = rhs.eval_point(point, ctx)?;
                op.apply(&left, &right, ctx)
            }
            NodeKind::At { arg, index } => {
                let value = arg.eval_point(point, ctx)?;
                match value.at(*index) {
                    Some(component) => Ok(IoBuffer::new(
                        IoDescriptor::scalar(),
                        value.dtype(),
                        smallvec![component],
                    )),
                    None => Err(EvaluationError::ComponentOutOfRange {
                        index: *index,
                        descriptor: value.descriptor(),
                    }),
                }
            }
            NodeKind::Dot { lhs, rhs } => {
                let left = lhs.eval_point(point, ctx)?;
                let right = rhs.eval_point(point, ctx)?;
                operators::dot(&left, &right, ctx)
            }
            NodeKind::Compose(items) => compose(items, point, ctx),
            NodeKind::Map(table) => table.evaluate(point, ctx),
            NodeKind::Conditional(clauses) => branching::evaluate_clauses(clauses, point, ctx),
            NodeKind::Safe { arg, mask } => safe::guarded(arg, *mask, point, ctx),
            NodeKind::MinMax(recorder) => recorder.evaluate(point, ctx),
        }
    }
}

fn compose(
    items: &[Function],
    point: &EvalPoint,
    ctx: &mut EvalContext,
) -> Result<IoBuffer, EvaluationError> {
    let mut values = smallvec::SmallVec::with_capacity(items.len());
    let mut dtype: Option<DataType> = None;
    for item in items {
        let value = item.eval_point(point, ctx)?;
        if !value.descriptor().is_scalar() {
            return Err(EvaluationError::ShapeMismatch {
                op: "compose",
                left: IoDescriptor::scalar(),
                right: value.descriptor(),
            });
        }
        dtype = Some(match (dtype, value.dtype()) {
            (None, got) => got,
            (Some(known), got) if known == got => known,
            (Some(DataType::Bool), got) | (Some(got), DataType::Bool) => {
                return Err(EvaluationError::TypeMismatch {
                    op: "compose",
                    expected: "components that are all bool or all numeric",
                    got,
                })
            }
            _ => DataType::Double,
        });
        values.extend_from_slice(value.as_slice());
    }
    Ok(IoBuffer::new(
        IoDescriptor::vector(items.len()),
        dtype.unwrap_or(DataType::Double),
        values,
    ))
}

fn fmt_component(f: &mut fmt::Formatter<'_>, dtype: DataType, v: f64) -> fmt::Result {
    match dtype {
        DataType::Bool => write!(f, "{}", v != 0.0),
        DataType::Int => write!(f, "{}", v as i64),
        DataType::Double => write!(f, "{v:?}"),
    }
}

fn fmt_buffer(f: &mut fmt::Formatter<'_>, buffer: &IoBuffer) -> fmt::Result {
    match buffer.as_slice() {
        [single] if buffer.descriptor().kind() == IoKind::Scalar => {
            fmt_component(f, buffer.dtype(), *single)
        }
        values => {
            write!(f, "(")?;
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                fmt_component(f, buffer.dtype(), *v)?;
            }
            write!(f, ")")
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            NodeKind::Constant(constant) => fmt_buffer(f, &constant.read()),
            NodeKind::Input => write!(f, "input"),
            NodeKind::Field(source) => write!(f, "{}", source.name()),
            NodeKind::Unary { op, arg } => op.fmt_expr(f, arg),
            NodeKind::Binary { op, lhs, rhs } => op.fmt_expr(f, lhs, rhs),
            NodeKind::At { arg, index } => write!(f, "{arg}[{index}]"),
            NodeKind::Dot { lhs, rhs } => write!(f, "dot({lhs}, {rhs})"),
            NodeKind::Compose(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            NodeKind::Map(table) => write!(f, "{table}"),
            NodeKind::Conditional(clauses) => {
                write!(f, "conditional(")?;
                for (i, clause) in clauses.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "({}, {})", clause.condition(), clause.result())?;
                }
                write!(f, ")")
            }
            NodeKind::Safe { arg, .. } => write!(f, "safe({arg})"),
            NodeKind::MinMax(recorder) => write!(f, "min_max({})", recorder.function()),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("expression", &self.to_string())
            .field("data_items", &self.node.data_items.len())
            .finish()
    }
}
