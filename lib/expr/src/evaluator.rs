//! Expression evaluation.

use crate::parse::{BinaryOp, Expr, parse};
use serde_json::{Map, Value};
use std::fmt;

/// Errors from expression evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    /// The expression could not be parsed.
    Parse { expression: String, reason: String },
}

impl fmt::Display for ExpressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse { expression, reason } => {
                write!(f, "failed to parse expression '{expression}': {reason}")
            }
        }
    }
}

impl std::error::Error for ExpressionError {}

/// Evaluates guard expressions against JSON data.
///
/// Implementations must be total over well-formed expressions: unknown paths
/// read as null and mixed-type comparisons are simply false, so only
/// malformed expressions produce errors.
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluates `expression` against `data`, returning its truthiness.
    ///
    /// # Errors
    ///
    /// Returns an [`ExpressionError`] for a malformed expression.
    fn evaluate(&self, expression: &str, data: &Map<String, Value>)
    -> Result<bool, ExpressionError>;
}

/// The default evaluator: comparison expressions over dotted JSON paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEvaluator;

impl DefaultEvaluator {
    /// Creates an evaluator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ExpressionEvaluator for DefaultEvaluator {
    fn evaluate(
        &self,
        expression: &str,
        data: &Map<String, Value>,
    ) -> Result<bool, ExpressionError> {
        let expr = parse(expression)?;
        Ok(truthy(&eval(&expr, data)))
    }
}

fn eval(expr: &Expr, data: &Map<String, Value>) -> Value {
    match expr {
        Expr::Literal(value) => value.clone(),
        Expr::Path(path) => resolve(path, data),
        Expr::Not(inner) => Value::Bool(!truthy(&eval(inner, data))),
        Expr::Binary { op, lhs, rhs } => {
            let result = match op {
                BinaryOp::And => truthy(&eval(lhs, data)) && truthy(&eval(rhs, data)),
                BinaryOp::Or => truthy(&eval(lhs, data)) || truthy(&eval(rhs, data)),
                BinaryOp::Eq => equals(&eval(lhs, data), &eval(rhs, data)),
                BinaryOp::Ne => !equals(&eval(lhs, data), &eval(rhs, data)),
                BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                    compare(*op, &eval(lhs, data), &eval(rhs, data))
                }
            };
            Value::Bool(result)
        }
    }
}

fn resolve(path: &[String], data: &Map<String, Value>) -> Value {
    let mut current = Value::Object(data.clone());
    for segment in path {
        match current {
            Value::Object(map) => {
                current = map.get(segment).cloned().unwrap_or(Value::Null);
            }
            _ => return Value::Null,
        }
    }
    current
}

/// Equality with numeric coercion: `1` and `1.0` are equal regardless of the
/// JSON representation.
fn equals(lhs: &Value, rhs: &Value) -> bool {
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(l), Some(r)) => l == r,
        _ => lhs == rhs,
    }
}

fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> bool {
    let ordering = match (lhs, rhs) {
        (Value::String(l), Value::String(r)) => l.cmp(r),
        _ => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(l), Some(r)) => match l.partial_cmp(&r) {
                Some(ordering) => ordering,
                None => return false,
            },
            // Ordering is undefined across types; the guard just fails.
            _ => return false,
        },
    };

    match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::Ge => ordering.is_ge(),
        _ => false,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
