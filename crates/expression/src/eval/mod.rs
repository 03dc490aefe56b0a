//! AST evaluation module
//!
//! Evaluates parsed fragment bodies against an [`EvaluationContext`].

use crate::context::EvaluationContext;
use crate::core::ast::{Expr, Segment, render_path};
use crate::error::{ExpressionError, ExpressionResult};
use crate::value_utils::{normalize_index, value_type_name};
use serde_json::Value;

/// Maximum nesting depth for fragments, calls and array literals
pub const MAX_NESTING_DEPTH: usize = 64;

/// Evaluator for expression ASTs
#[derive(Debug, Clone)]
pub struct Evaluator {
    max_depth: usize,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    /// Create an evaluator with the default nesting limit
    pub fn new() -> Self {
        Self {
            max_depth: MAX_NESTING_DEPTH,
        }
    }

    /// Create an evaluator with a custom nesting limit
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Evaluate an expression in the given context
    #[inline]
    pub fn eval(&self, expr: &Expr, context: &EvaluationContext) -> ExpressionResult<Value> {
        self.eval_with_depth(expr, context, 0)
    }

    fn eval_with_depth(
        &self,
        expr: &Expr,
        context: &EvaluationContext,
        depth: usize,
    ) -> ExpressionResult<Value> {
        if depth > self.max_depth {
            return Err(ExpressionError::depth_exceeded(self.max_depth));
        }
        match expr {
            Expr::Literal(value) => Ok(value.clone()),

            Expr::Array(items) => items
                .iter()
                .map(|item| self.eval_with_depth(item, context, depth + 1))
                .collect::<ExpressionResult<Vec<_>>>()
                .map(Value::Array),

            Expr::Path { root, segments } => self.eval_path(root, segments, context, depth),

            Expr::Call { name, args } => {
                if !context.registry().has_function(name) {
                    return Err(ExpressionError::unknown_function(&**name));
                }
                let args = args
                    .iter()
                    .map(|arg| self.eval_with_depth(arg, context, depth + 1))
                    .collect::<ExpressionResult<Vec<_>>>()?;
                tracing::trace!(function = %name, args = args.len(), "calling expression function");
                context.registry().call(name, &args)
            }

            Expr::Fragment(inner) => self.eval_with_depth(inner, context, depth + 1),

            Expr::Access { object, segments } => {
                let value = self.eval_with_depth(object, context, depth + 1)?;
                self.access(value, segments, context, depth)
            }
        }
    }

    fn eval_path(
        &self,
        root: &str,
        segments: &[Segment],
        context: &EvaluationContext,
        depth: usize,
    ) -> ExpressionResult<Value> {
        let keys: Vec<&str> = segments
            .iter()
            .map_while(|s| match s {
                Segment::Key(k) => Some(&**k),
                _ => None,
            })
            .collect();

        let (value, consumed) = context
            .resolve_root(root, &keys)
            .ok_or_else(|| ExpressionError::unresolved(render_path(root, segments)))?;

        self.access(value, &segments[consumed..], context, depth)
    }

    /// Apply access segments. Missing keys and out-of-range indices yield
    /// null; stepping into a scalar is a type error.
    fn access(
        &self,
        mut value: Value,
        segments: &[Segment],
        context: &EvaluationContext,
        depth: usize,
    ) -> ExpressionResult<Value> {
        for segment in segments {
            let step = match segment {
                Segment::Key(key) => Step::Key(key.to_string()),
                Segment::Index(i) => Step::Index(*i),
                Segment::Computed(expr) => match self.eval_with_depth(expr, context, depth + 1)? {
                    Value::String(key) => Step::Key(key),
                    Value::Number(n) if n.is_i64() => Step::Index(n.as_i64().unwrap_or_default()),
                    other => {
                        return Err(ExpressionError::type_error(
                            "string or integer index",
                            value_type_name(&other),
                        ));
                    }
                },
            };
            value = step_into(value, &step)?;
        }
        Ok(value)
    }
}

enum Step {
    Key(String),
    Index(i64),
}

fn step_into(value: Value, step: &Step) -> ExpressionResult<Value> {
    match (value, step) {
        (Value::Null, _) => Ok(Value::Null),
        (Value::Object(mut map), Step::Key(key)) => Ok(map.remove(key).unwrap_or(Value::Null)),
        (Value::Array(mut items), Step::Index(i)) => Ok(normalize_index(*i, items.len())
            .map(|i| items.swap_remove(i))
            .unwrap_or(Value::Null)),
        (Value::Array(mut items), Step::Key(key)) => match key.parse::<i64>() {
            Ok(i) => Ok(normalize_index(i, items.len())
                .map(|i| items.swap_remove(i))
                .unwrap_or(Value::Null)),
            Err(_) => Err(ExpressionError::type_error("object", "array")),
        },
        (Value::Object(_), Step::Index(_)) => Err(ExpressionError::type_error("array", "object")),
        (other, Step::Key(_)) => Err(ExpressionError::type_error("object", value_type_name(&other))),
        (other, Step::Index(_)) => Err(ExpressionError::type_error("array", value_type_name(&other))),
    }
}
