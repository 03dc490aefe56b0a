//! Array functions

use super::{check_arg_count, check_arg_range, get_array_arg, get_string_arg};
use crate::error::{ExpressionError, ExpressionResult};
use crate::value_utils::{to_display_string, value_type_name, values_equal};
use serde_json::Value;

/// First element, or null for an empty array
pub fn first(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("first", args, 1)?;
    let items = get_array_arg("first", args, 0, "array")?;
    Ok(items.first().cloned().unwrap_or(Value::Null))
}

/// Last element, or null for an empty array
pub fn last(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("last", args, 1)?;
    let items = get_array_arg("last", args, 0, "array")?;
    Ok(items.last().cloned().unwrap_or(Value::Null))
}

/// Join elements with a separator (default `,`)
pub fn join(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_range("join", args, 1, 2)?;
    let items = get_array_arg("join", args, 0, "array")?;
    let separator = if args.len() == 2 {
        get_string_arg("join", args, 1, "separator")?
    } else {
        ","
    };
    let joined = items
        .iter()
        .map(to_display_string)
        .collect::<Vec<_>>()
        .join(separator);
    Ok(Value::String(joined))
}

/// Number of elements
pub fn count(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("count", args, 1)?;
    Ok(Value::from(get_array_arg("count", args, 0, "array")?.len()))
}

/// Membership in an array, or substring containment in a string
pub fn includes(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("includes", args, 2)?;
    match (&args[0], &args[1]) {
        (Value::Array(items), needle) => Ok(Value::Bool(
            items.iter().any(|item| values_equal(item, needle)),
        )),
        (Value::String(haystack), Value::String(needle)) => {
            Ok(Value::Bool(haystack.contains(needle.as_str())))
        }
        (Value::String(_), other) => Err(ExpressionError::type_error(
            "string",
            value_type_name(other),
        )),
        (other, _) => Err(ExpressionError::type_error(
            "array or string",
            value_type_name(other),
        )),
    }
}
