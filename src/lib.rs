//! Composable, lazily evaluated numeric Functions.
//!
//! This crate builds immutable graphs of numeric expressions from literals, coordinate
//! inputs and external data items, and evaluates them point by point over batches of
//! coordinates. Graphs can branch on integer keys or boolean conditions, guard subtrees
//! against floating point faults, and be evaluated collectively by several workers that
//! each own only part of the domain.
//!
//! # Features
//!
//! - Operator overloading and a math function set over scalar, vector and tensor values
//! - `map` and `conditional` branching nodes
//! - `SafeMaths` fault detection for divide by zero, invalid, overflow and underflow
//! - Text expressions parsed through [evalexpr](https://github.com/ISibboI/evalexpr)
//! - `FunctionInput` providers and `FieldSource` data items for discretised structures
//! - Cross-worker evaluation with `evaluate_global`
//!
//! # Example
//!
//! ```rust
//! use fngraph::prelude::*;
//!
//! // f(x) = sin(x) + 1 for x < 0, x^2 otherwise
//! let x = input().at(0);
//! let f = branching::conditional([
//!     (x.less(0.0), x.sin() + 1.0),
//!     (x.greater_equal(0.0), x.pow(2.0)),
//! ])
//! .unwrap();
//!
//! let results = f.evaluate(vec![vec![-1.0], vec![3.0]]).unwrap();
//! assert_eq!(results.values().column(0).to_vec(), vec![(-1.0f64).sin() + 1.0, 9.0]);
//! ```

pub use errors::{ConvertError, EvaluationError, FunctionError};
pub use expr::Function;
pub use query::{evaluate, Query, Results};

pub mod prelude {
    pub use crate::backends::points::EvalData;
    pub use crate::branching;
    pub use crate::convert::{convert, FnArg};
    pub use crate::errors::{CommError, ConvertError, EvaluationError, FaultKind, FunctionError};
    pub use crate::expr::{EvalContext, Function};
    pub use crate::faults::FaultFlags;
    pub use crate::field::{DomainField, FieldSource, IndexedField};
    pub use crate::global::{
        evaluate_global, Communicator, GlobalOptions, SelfCommunicator, ThreadCommunicator,
    };
    pub use crate::input::{ArrayInput, EvalPoint, FunctionInput, IndexSetInput, PointContext};
    pub use crate::io::{DataType, IoBuffer, IoDescriptor, IoKind};
    pub use crate::math;
    pub use crate::ops::{
        add, at, constant, coord, divide, greater, greater_equal, input, less, less_equal,
        logical_and, logical_not, logical_or, logical_xor, multiply, subtract,
    };
    pub use crate::query::{evaluate, Query, Results};
    pub use crate::safe::{safe_maths, safe_maths_masked};
    pub use crate::view;
}

/// Input data conversions for the evaluation query
pub mod backends {
    pub mod points;
}
/// Branching nodes: `map` and `conditional`
pub mod branching;
/// Conversion of literals and Functions into graph nodes
pub mod convert;
/// Error types for the various failure modes
pub mod errors;
/// Function graph nodes and the evaluation visitor
pub mod expr;
/// Floating point fault classification
pub mod faults;
/// External data items as Function leaves
pub mod field;
/// Cross-worker evaluation
pub mod global;
/// Evaluation points and point providers
pub mod input;
/// Value shapes and buffers
pub mod io;
/// Math function set
pub mod math;
/// Elementwise operator kernels
pub mod operators;
/// Operator overloading and named builders
pub mod ops;
/// Parsing text expressions into Functions
pub mod parse;
/// Evaluation of Functions over batches of points
pub mod query;
/// Fault-detecting wrapper
pub mod safe;
/// Recording views
pub mod view;
