//! Text expressions as Function graphs.
//!
//! Expressions are parsed by [evalexpr](https://github.com/ISibboI/evalexpr) and the
//! resulting operator tree is walked into Function nodes. Every variable becomes
//! one component of the evaluation coordinate: by default variables are ordered
//! alphabetically, so in `"y * x"` the coordinate is `(x, y)`.
//!
//! Supported syntax:
//! * Arithmetic: `+`, `-`, `*`, `/`, `^` and unary `-`
//! * Comparisons `<`, `<=`, `>`, `>=` and logic `&&`, `||`, `!`
//! * Tuples, which compose into vector valued Functions
//! * Integer, float and boolean literals
//! * Calls to the unary math set (`sin`, `ln`, `sqrt`, `erf`, ...) and to `pow`,
//!   `atan2`, `min`, `max`, `dot`, with or without a `math::` prefix

use std::collections::{HashMap, HashSet};

use evalexpr::{build_operator_tree, Node, Operator, Value};

use crate::errors::FunctionError;
use crate::expr::Function;
use crate::operators::binary::BinaryOp;
use crate::operators::unary::UnaryOp;

impl Function {
    /// Parses `text`, mapping its variables alphabetically onto coordinate components.
    ///
    /// # Example
    /// ```
    /// use fngraph::prelude::*;
    ///
    /// let f = Function::parse("2*x + y^2").unwrap();
    /// assert_eq!(f.evaluate(vec![1.0, 2.0]).unwrap().values()[[0, 0]], 6.0);
    /// ```
    pub fn parse(text: &str) -> Result<Function, FunctionError> {
        let tree: Node = build_operator_tree(text)?;
        let var_map = extract_symbols(&tree);
        build_function(&tree, &var_map)
    }

    /// Parses `text`, mapping `vars[i]` onto coordinate component `i`.
    ///
    /// # Returns
    /// * `Err(FunctionError::VariableNotFound)` - `text` uses a variable not listed in `vars`
    pub fn parse_with_vars(text: &str, vars: &[&str]) -> Result<Function, FunctionError> {
        let tree: Node = build_operator_tree(text)?;
        let var_map = vars
            .iter()
            .enumerate()
            .map(|(i, v)| (v.to_string(), i))
            .collect();
        build_function(&tree, &var_map)
    }
}

/// Maps every variable read in `node` to its index in alphabetical order.
pub(crate) fn extract_symbols(node: &Node) -> HashMap<String, usize> {
    let mut symbols = HashSet::new();
    extract_symbols_from_node(node, &mut symbols);

    let mut symbols: Vec<String> = symbols.into_iter().collect();
    symbols.sort();

    symbols
        .into_iter()
        .enumerate()
        .map(|(i, v)| (v, i))
        .collect()
}

fn extract_symbols_from_node(node: &Node, symbols: &mut HashSet<String>) {
    match node.operator() {
        Operator::VariableIdentifierRead { identifier } => {
            symbols.insert(identifier.to_string());
        }
        _ => {
            for child in node.children() {
                extract_symbols_from_node(child, symbols);
            }
        }
    }
}

/// Folds the children of an n-ary node with `op`.
fn fold(
    node: &Node,
    op: BinaryOp,
    var_map: &HashMap<String, usize>,
) -> Result<Function, FunctionError> {
    let children = node.children();
    let first = children
        .first()
        .ok_or_else(|| FunctionError::UnsupportedOperator(format!("{:?} without operands", node.operator())))?;
    children
        .iter()
        .skip(1)
        .try_fold(build_function(first, var_map)?, |acc, child| {
            Ok(Function::binary(op, acc, build_function(child, var_map)?))
        })
}

fn binary(
    node: &Node,
    op: BinaryOp,
    var_map: &HashMap<String, usize>,
) -> Result<Function, FunctionError> {
    match node.children() {
        [lhs, rhs] => Ok(Function::binary(
            op,
            build_function(lhs, var_map)?,
            build_function(rhs, var_map)?,
        )),
        children => Err(FunctionError::Arity {
            name: op.name().to_string(),
            expected: 2,
            got: children.len(),
        }),
    }
}

fn single(node: &Node, var_map: &HashMap<String, usize>) -> Result<Function, FunctionError> {
    match node.children() {
        [only] => build_function(only, var_map),
        children => Err(FunctionError::UnsupportedOperator(format!(
            "{:?} with {} operands",
            node.operator(),
            children.len()
        ))),
    }
}

/// Arguments of a call: brace groups are unwrapped and a tuple spreads into several.
fn arguments(node: &Node) -> Vec<&Node> {
    let mut args: Vec<&Node> = node.children().iter().collect();
    while let [single] = args.as_slice() {
        let single: &Node = *single;
        match single.operator() {
            Operator::RootNode | Operator::Tuple => args = single.children().iter().collect(),
            _ => break,
        }
    }
    args
}

fn unary_op(name: &str) -> Option<UnaryOp> {
    Some(match name {
        "sin" => UnaryOp::Sin,
        "cos" => UnaryOp::Cos,
        "tan" => UnaryOp::Tan,
        "asin" => UnaryOp::Asin,
        "acos" => UnaryOp::Acos,
        "atan" => UnaryOp::Atan,
        "sinh" => UnaryOp::Sinh,
        "cosh" => UnaryOp::Cosh,
        "tanh" => UnaryOp::Tanh,
        "asinh" => UnaryOp::Asinh,
        "acosh" => UnaryOp::Acosh,
        "atanh" => UnaryOp::Atanh,
        "exp" => UnaryOp::Exp,
        "ln" | "log" => UnaryOp::Log,
        "log2" => UnaryOp::Log2,
        "log10" => UnaryOp::Log10,
        "sqrt" => UnaryOp::Sqrt,
        "erf" => UnaryOp::Erf,
        "erfc" => UnaryOp::Erfc,
        "abs" => UnaryOp::Abs,
        _ => return None,
    })
}

fn call(
    identifier: &str,
    node: &Node,
    var_map: &HashMap<String, usize>,
) -> Result<Function, FunctionError> {
    let name = identifier.strip_prefix("math::").unwrap_or(identifier);
    let args = arguments(node)
        .into_iter()
        .map(|arg| build_function(arg, var_map))
        .collect::<Result<Vec<_>, _>>()?;
    let arity = |expected: usize| {
        if args.len() == expected {
            Ok(())
        } else {
            Err(FunctionError::Arity {
                name: name.to_string(),
                expected,
                got: args.len(),
            })
        }
    };

    if let Some(op) = unary_op(name) {
        arity(1)?;
        return Ok(Function::unary(op, args[0].clone()));
    }
    let op = match name {
        "pow" => BinaryOp::Power,
        "atan2" => BinaryOp::Atan2,
        "min" => BinaryOp::Min,
        "max" => BinaryOp::Max,
        "dot" => {
            arity(2)?;
            return Ok(args[0].dot(&args[1]));
        }
        _ => return Err(FunctionError::UnsupportedFunction(identifier.to_string())),
    };
    arity(2)?;
    Ok(Function::binary(op, args[0].clone(), args[1].clone()))
}

/// Converts an evalexpr operator tree into a Function graph.
///
/// # Arguments
/// * `node` - The evalexpr node to convert
/// * `var_map` - Coordinate component assigned to each variable name
///
/// # Returns
/// * `Result<Function, FunctionError>` - The Function, or the first unsupported construct
pub(crate) fn build_function(
    node: &Node,
    var_map: &HashMap<String, usize>,
) -> Result<Function, FunctionError> {
    match node.operator() {
        Operator::Add => fold(node, BinaryOp::Add, var_map),
        Operator::Mul => fold(node, BinaryOp::Multiply, var_map),
        Operator::Sub => binary(node, BinaryOp::Subtract, var_map),
        Operator::Div => binary(node, BinaryOp::Divide, var_map),
        Operator::Exp => binary(node, BinaryOp::Power, var_map),
        Operator::Lt => binary(node, BinaryOp::Less, var_map),
        Operator::Leq => binary(node, BinaryOp::LessEqual, var_map),
        Operator::Gt => binary(node, BinaryOp::Greater, var_map),
        Operator::Geq => binary(node, BinaryOp::GreaterEqual, var_map),
        Operator::And => fold(node, BinaryOp::And, var_map),
        Operator::Or => fold(node, BinaryOp::Or, var_map),
        Operator::Neg => Ok(-single(node, var_map)?),
        Operator::Not => Ok(!single(node, var_map)?),
        Operator::Const { value } => match value {
            Value::Float(f) => Ok(Function::from(*f)),
            Value::Int(i) => Ok(Function::try_from(*i)?),
            Value::Boolean(b) => Ok(Function::from(*b)),
            other => Err(FunctionError::UnsupportedConstant(format!("{other:?}"))),
        },
        Operator::VariableIdentifierRead { identifier } => {
            let index = var_map
                .get(identifier.as_str())
                .ok_or_else(|| FunctionError::VariableNotFound(identifier.to_string()))?;
            Ok(Function::input().at(*index))
        }
        Operator::Tuple => Ok(Function::compose(
            node.children()
                .iter()
                .map(|child| build_function(child, var_map))
                .collect::<Result<Vec<_>, _>>()?,
        )),
        Operator::FunctionIdentifier { identifier } => call(identifier, node, var_map),
        Operator::RootNode => single(node, var_map),
        other => Err(FunctionError::UnsupportedOperator(format!("{other:?}"))),
    }
}
