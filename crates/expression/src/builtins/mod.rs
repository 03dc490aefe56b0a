//! Built-in functions for the expression language
//!
//! This module provides all built-in functions organized by category.
//! [`register_all`] installs them into a [`Registry`].

pub mod array;
pub mod conversion;
pub mod datetime;
pub mod math;
pub mod string;

use crate::error::{ExpressionError, ExpressionResult};
use crate::registry::Registry;
use crate::value_utils::{to_float, value_type_name};
use serde_json::Value;

/// Install every builtin into `registry`
pub(crate) fn register_all(registry: &Registry) {
    register_string_functions(registry);
    register_math_functions(registry);
    register_array_functions(registry);
    register_conversion_functions(registry);
    register_datetime_functions(registry);
}

fn register_string_functions(r: &Registry) {
    r.register_builtin("upper", "Convert text to upper case", &["text"], string::upper);
    r.register_builtin("lower", "Convert text to lower case", &["text"], string::lower);
    r.register_builtin("trim", "Strip surrounding whitespace", &["text"], string::trim);
    r.register_builtin("concat", "Join values into one string, or arrays into one array", &["values..."], string::concat);
    r.register_builtin("replace", "Replace every occurrence of a substring", &["text", "from", "to"], string::replace);
    r.register_builtin("split", "Split text on a delimiter", &["text", "delimiter"], string::split);
    r.register_builtin("substring", "Characters from start up to (not including) end", &["text", "start", "end"], string::substring);
    r.register_builtin("length", "Length of a string, array or object", &["value"], string::length);
}

fn register_math_functions(r: &Registry) {
    r.register_builtin("abs", "Absolute value", &["number"], math::abs);
    r.register_builtin("round", "Round to the given number of decimals", &["number", "decimals"], math::round);
    r.register_builtin("floor", "Round down", &["number"], math::floor);
    r.register_builtin("ceil", "Round up", &["number"], math::ceil);
    r.register_builtin("min", "Smallest of the numbers or of one array", &["numbers..."], math::min);
    r.register_builtin("max", "Largest of the numbers or of one array", &["numbers..."], math::max);
    r.register_builtin("sum", "Sum of the numbers or of one array", &["numbers..."], math::sum);
}

fn register_array_functions(r: &Registry) {
    r.register_builtin("first", "First element of an array", &["array"], array::first);
    r.register_builtin("last", "Last element of an array", &["array"], array::last);
    r.register_builtin("join", "Join array elements with a separator", &["array", "separator"], array::join);
    r.register_builtin("count", "Number of elements in an array", &["array"], array::count);
    r.register_builtin("includes", "Whether an array or string contains a value", &["collection", "value"], array::includes);
}

fn register_conversion_functions(r: &Registry) {
    r.register_builtin("to_string", "Convert a value to its string form", &["value"], conversion::to_string);
    r.register_builtin("to_number", "Parse a value as a number", &["value"], conversion::to_number);
    r.register_builtin("to_boolean", "Convert a value using truthiness", &["value"], conversion::to_boolean);
    r.register_builtin("default", "Value, or the fallback when it is null or empty", &["value", "fallback"], conversion::default);
    r.register_builtin("coalesce", "First argument that is not null", &["values..."], conversion::coalesce);
    r.register_builtin("is_empty", "Whether a value is null or an empty string/collection", &["value"], conversion::is_empty);
    r.register_builtin("if", "Pick a value by the truthiness of a condition", &["condition", "then", "else"], conversion::if_then_else);
}

fn register_datetime_functions(r: &Registry) {
    r.register_builtin("now", "Current UTC time as RFC 3339", &[], datetime::now);
    r.register_builtin("today", "Current UTC date as YYYY-MM-DD", &[], datetime::today);
}

/// Helper to check argument count
pub(crate) fn check_arg_count(func_name: &str, args: &[Value], expected: usize) -> ExpressionResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ExpressionError::invalid_argument(
            func_name,
            format!("expected {expected} arguments, got {}", args.len()),
        ))
    }
}

/// Helper to check an inclusive argument count range
pub(crate) fn check_arg_range(
    func_name: &str,
    args: &[Value],
    min: usize,
    max: usize,
) -> ExpressionResult<()> {
    if (min..=max).contains(&args.len()) {
        Ok(())
    } else {
        Err(ExpressionError::invalid_argument(
            func_name,
            format!("expected {min} to {max} arguments, got {}", args.len()),
        ))
    }
}

fn get_arg<'a>(func_name: &str, args: &'a [Value], index: usize, arg_name: &str) -> ExpressionResult<&'a Value> {
    args.get(index).ok_or_else(|| {
        ExpressionError::invalid_argument(
            func_name,
            format!("missing argument '{arg_name}' at position {index}"),
        )
    })
}

/// Helper to get a string argument with better error message
pub(crate) fn get_string_arg<'a>(
    func_name: &str,
    args: &'a [Value],
    index: usize,
    arg_name: &str,
) -> ExpressionResult<&'a str> {
    let value = get_arg(func_name, args, index, arg_name)?;
    value.as_str().ok_or_else(|| {
        ExpressionError::invalid_argument(
            func_name,
            format!(
                "argument '{arg_name}' must be a string, got {}",
                value_type_name(value)
            ),
        )
    })
}

/// Helper to get a number argument (int or float) with better error message
pub(crate) fn get_number_arg(
    func_name: &str,
    args: &[Value],
    index: usize,
    arg_name: &str,
) -> ExpressionResult<f64> {
    let value = get_arg(func_name, args, index, arg_name)?;
    match value {
        Value::Number(_) => to_float(value).map_err(|e| ExpressionError::invalid_argument(func_name, e)),
        other => Err(ExpressionError::invalid_argument(
            func_name,
            format!(
                "argument '{arg_name}' must be a number, got {}",
                value_type_name(other)
            ),
        )),
    }
}

/// Helper to get an integer argument with better error message
pub(crate) fn get_int_arg(
    func_name: &str,
    args: &[Value],
    index: usize,
    arg_name: &str,
) -> ExpressionResult<i64> {
    let n = get_number_arg(func_name, args, index, arg_name)?;
    if n.fract() == 0.0 {
        Ok(n as i64)
    } else {
        Err(ExpressionError::invalid_argument(
            func_name,
            format!("argument '{arg_name}' must be an integer, got {n}"),
        ))
    }
}

/// Helper to get an array argument with better error message
pub(crate) fn get_array_arg<'a>(
    func_name: &str,
    args: &'a [Value],
    index: usize,
    arg_name: &str,
) -> ExpressionResult<&'a Vec<Value>> {
    let value = get_arg(func_name, args, index, arg_name)?;
    value.as_array().ok_or_else(|| {
        ExpressionError::invalid_argument(
            func_name,
            format!(
                "argument '{arg_name}' must be an array, got {}",
                value_type_name(value)
            ),
        )
    })
}

/// Variadic numeric arguments, or the elements of a single array argument
pub(crate) fn numeric_operands(func_name: &str, args: &[Value]) -> ExpressionResult<Vec<f64>> {
    let items: &[Value] = match args {
        [Value::Array(items)] => items,
        _ => args,
    };
    items
        .iter()
        .enumerate()
        .map(|(i, _)| get_number_arg(func_name, items, i, "number"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_string_arg_type_error() {
        let args = vec![json!(42)];
        let msg = get_string_arg("test_func", &args, 0, "text")
            .unwrap_err()
            .to_string();
        assert!(msg.contains("argument 'text' must be a string"));
        assert!(msg.contains("number"));
    }

    #[test]
    fn test_get_int_arg_rejects_fraction() {
        let args = vec![json!(1.5)];
        assert!(get_int_arg("test_func", &args, 0, "count").is_err());
        assert_eq!(get_int_arg("test_func", &[json!(3.0)], 0, "count").unwrap(), 3);
    }

    #[test]
    fn test_missing_argument() {
        let msg = get_array_arg("first", &[], 0, "array").unwrap_err().to_string();
        assert!(msg.contains("missing argument 'array' at position 0"));
    }

    #[test]
    fn test_numeric_operands_accept_single_array() {
        assert_eq!(
            numeric_operands("sum", &[json!([1, 2.5])]).unwrap(),
            vec![1.0, 2.5]
        );
        assert_eq!(numeric_operands("sum", &[json!(1), json!(2)]).unwrap(), vec![1.0, 2.0]);
        assert!(numeric_operands("sum", &[json!("x")]).is_err());
    }
}
