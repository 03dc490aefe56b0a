//! Type conversion and utility functions

use super::{check_arg_count, get_arg};
use crate::error::{ExpressionError, ExpressionResult};
use crate::value_utils::{self, number_from_f64, to_display_string, to_float, value_type_name};
use serde_json::Value;

/// Convert a value to its display string
pub fn to_string(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("to_string", args, 1)?;
    Ok(Value::String(to_display_string(&args[0])))
}

/// Parse a value as a number
pub fn to_number(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("to_number", args, 1)?;
    if let Value::Number(_) = &args[0] {
        return Ok(args[0].clone());
    }
    to_float(&args[0])
        .map(number_from_f64)
        .map_err(|_| ExpressionError::type_error("number", value_type_name(&args[0])))
}

/// Convert a value by truthiness; the strings `"false"` and `"0"` are false
pub fn to_boolean(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("to_boolean", args, 1)?;
    let result = match &args[0] {
        Value::String(s) => !matches!(s.trim().to_ascii_lowercase().as_str(), "" | "false" | "0"),
        other => value_utils::is_truthy(other),
    };
    Ok(Value::Bool(result))
}

/// The value, or the fallback when the value is null or an empty string
pub fn default(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("default", args, 2)?;
    match &args[0] {
        Value::Null => Ok(args[1].clone()),
        Value::String(s) if s.is_empty() => Ok(args[1].clone()),
        value => Ok(value.clone()),
    }
}

/// First argument that is not null
pub fn coalesce(args: &[Value]) -> ExpressionResult<Value> {
    Ok(args
        .iter()
        .find(|v| !v.is_null())
        .cloned()
        .unwrap_or(Value::Null))
}

/// Whether a value is null or an empty string/collection
pub fn is_empty(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("is_empty", args, 1)?;
    Ok(Value::Bool(value_utils::is_empty(&args[0])))
}

/// `if(condition, then, else)`; both branches are already evaluated
pub fn if_then_else(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("if", args, 3)?;
    let condition = get_arg("if", args, 0, "condition")?;
    Ok(if value_utils::is_truthy(condition) {
        args[1].clone()
    } else {
        args[2].clone()
    })
}
