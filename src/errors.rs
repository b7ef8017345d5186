//! Error types for the fngraph crate.
//!
//! Errors are split by the phase in which they are discovered:
//!
//! - `ConvertError`: building a graph from literals, collections or branch tables
//! - `EvaluationError`: walking a graph against concrete evaluation points
//! - `CommError`: moving data between workers during global evaluation
//! - `FunctionError`: high-level wrapper used when parsing expression strings
//!
//! Nothing is retried or suppressed internally; every error is raised at the point
//! of detection and propagated to the caller.

use evalexpr::{DefaultNumericTypes, EvalexprError};
use thiserror::Error;

use crate::io::{DataType, IoDescriptor, IoKind};

/// Errors raised while converting values into Function nodes or constructing nodes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvertError {
    /// An operator received no operand
    #[error("operator '{0}' is not defined for a missing operand")]
    NullOperand(&'static str),
    /// A collection with no elements cannot become a Function
    #[error("cannot convert an empty collection into a Function")]
    EmptyCollection,
    /// Literal collection elements must all share one scalar kind
    #[error(
        "collection {value} is not homogeneous in type; elements must all be bool, all int or all float"
    )]
    Heterogeneous { value: String },
    /// Collections of collections are not convertible
    #[error(
        "collection {value} contains a nested collection; only bool, int, float or Function elements are accepted"
    )]
    NestedCollection { value: String },
    /// Map keys must be non-negative integers
    #[error("branching map key {0} is negative; keys must be non-negative integers")]
    NegativeMapKey(i64),
    /// Integer values are stored in an `f64` and must stay within 2^53 in magnitude
    #[error("integer {0} cannot be represented exactly; ints must lie within ±2^53")]
    IntOutOfRange(i64),
    /// A conditional needs at least one clause
    #[error("conditional requires at least one (condition, result) clause")]
    EmptyClauses,
    /// Constant replacement must keep the descriptor and type of the original value
    #[error(
        "constant value must keep its original shape and type: expected {expected} {expected_dtype}, got {got} {got_dtype}"
    )]
    ConstantMismatch {
        expected: IoDescriptor,
        expected_dtype: DataType,
        got: IoDescriptor,
        got_dtype: DataType,
    },
    /// Only constant nodes may have their value replaced
    #[error("only constant Functions support value replacement")]
    NotConstant,
    /// Constant replacement values must be literals
    #[error("constant value must be a bool, int, float or a homogeneous collection of them, got {0}")]
    NotLiteral(String),
    /// Component indices must be non-negative
    #[error("component index {0} is negative")]
    NegativeComponent(i64),
}

/// Classes of floating point faults detected by `SafeMaths`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    DivideByZero,
    Invalid,
    Overflow,
    Underflow,
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FaultKind::DivideByZero => "divide-by-zero",
            FaultKind::Invalid => "invalid operation",
            FaultKind::Overflow => "overflow",
            FaultKind::Underflow => "underflow",
        };
        write!(f, "{name}")
    }
}

/// Errors raised while evaluating a Function graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    /// Operand widths are incompatible for the requested operator
    #[error("shape mismatch in '{op}': {left} is not compatible with {right}")]
    ShapeMismatch {
        op: &'static str,
        left: IoDescriptor,
        right: IoDescriptor,
    },
    /// Operand data type is not accepted by the operator
    #[error("type mismatch in '{op}': expected {expected}, got {got}")]
    TypeMismatch {
        op: &'static str,
        expected: &'static str,
        got: DataType,
    },
    /// Input data is inconsistent with the declared input type or cannot be converted
    #[error("input conversion failed: {0}")]
    InputType(String),
    /// Declared input kind does not match the width of the supplied rows
    #[error(
        "declared {kind} input, but input rows have {width} values; {kind} inputs must have {expected} values"
    )]
    DeclaredTypeMismatch {
        kind: IoKind,
        width: usize,
        expected: &'static str,
    },
    /// The coordinate lies outside the locally owned domain
    #[error("coordinate {coord:?} lies outside the local domain of '{source_name}'")]
    OutOfDomain {
        source_name: String,
        coord: Vec<f64>,
    },
    /// A data item needs discretisation context that the evaluation point does not carry
    #[error("'{0}' can only be evaluated at points supplied by a FunctionInput")]
    MissingContext(String),
    /// A floating point fault was raised inside a `SafeMaths` wrapped subtree
    #[error("numeric fault detected: {0}")]
    NumericFault(FaultKind),
    /// No branch was selected for an evaluation point
    #[error("no branch matched: {0}")]
    UnmatchedBranch(String),
    /// Global evaluation could not resolve the listed points on any worker
    #[error("no result found on any worker for point(s) {indices:?}")]
    NoResultFound { indices: Vec<usize> },
    /// Component extraction past the end of the operand
    #[error("component {index} requested from a Function returning {descriptor}")]
    ComponentOutOfRange {
        index: usize,
        descriptor: IoDescriptor,
    },
    /// The results of a batch do not share a single output shape
    #[error("inconsistent output across points: {first} then {later}")]
    InconsistentOutput {
        first: IoDescriptor,
        later: IoDescriptor,
    },
    /// Another worker failed during a collective evaluation
    #[error("worker {rank} failed during global evaluation: {message}")]
    PeerFailure { rank: usize, message: String },
    /// The collective exchange itself failed
    #[error("communication failure: {0}")]
    Communication(#[from] CommError),
}

impl EvaluationError {
    /// True for the "point not owned locally" condition tolerated by global evaluation.
    pub fn is_out_of_domain(&self) -> bool {
        matches!(self, EvaluationError::OutOfDomain { .. })
    }
}

/// Errors raised by a `Communicator` during collective exchanges.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommError {
    /// A peer hung up before the exchange completed
    #[error("worker {0} disconnected")]
    Disconnected(usize),
    /// Rank outside of the communicator
    #[error("rank {rank} is not part of a communicator of size {size}")]
    InvalidRank { rank: usize, size: usize },
    /// A message of an unexpected kind arrived
    #[error("unexpected message: {0}")]
    Protocol(String),
}

/// High-level errors for building Functions from expression strings.
#[derive(Debug, Error)]
pub enum FunctionError {
    /// Error when parsing the expression string with evalexpr
    #[error("failed to parse expression")]
    Parse(#[from] EvalexprError<DefaultNumericTypes>),
    /// Error when converting parsed nodes or literals into Functions
    #[error("failed to build Function")]
    Convert(#[from] ConvertError),
    /// Error when evaluating the built Function
    #[error("failed to evaluate Function")]
    Evaluation(#[from] EvaluationError),
    /// An operator in the parsed expression has no Function counterpart
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),
    /// A called function has no Function counterpart
    #[error("unsupported function: {0}")]
    UnsupportedFunction(String),
    /// A called function received the wrong number of arguments
    #[error("function '{name}' expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },
    /// A literal of an unsupported type appeared in the expression
    #[error("unsupported constant: {0}")]
    UnsupportedConstant(String),
    /// Error when a variable is not found in the variable map
    #[error("variable not found: {0}")]
    VariableNotFound(String),
}
