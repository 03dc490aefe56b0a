//! String manipulation functions

use super::{check_arg_count, check_arg_range, get_int_arg, get_string_arg};
use crate::error::{ExpressionError, ExpressionResult};
use crate::value_utils::{to_display_string, value_type_name};
use serde_json::Value;

/// Convert string to uppercase
pub fn upper(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("upper", args, 1)?;
    let s = get_string_arg("upper", args, 0, "text")?;
    Ok(Value::String(s.to_uppercase()))
}

/// Convert string to lowercase
pub fn lower(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("lower", args, 1)?;
    let s = get_string_arg("lower", args, 0, "text")?;
    Ok(Value::String(s.to_lowercase()))
}

/// Trim whitespace from both ends of a string
pub fn trim(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("trim", args, 1)?;
    let s = get_string_arg("trim", args, 0, "text")?;
    Ok(Value::String(s.trim().to_string()))
}

/// Concatenate arrays when every argument is an array, otherwise the
/// display forms of all arguments
pub fn concat(args: &[Value]) -> ExpressionResult<Value> {
    if !args.is_empty() && args.iter().all(Value::is_array) {
        let joined = args
            .iter()
            .filter_map(Value::as_array)
            .flatten()
            .cloned()
            .collect();
        return Ok(Value::Array(joined));
    }
    Ok(Value::String(args.iter().map(to_display_string).collect()))
}

/// Replace occurrences of a substring
pub fn replace(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("replace", args, 3)?;
    let s = get_string_arg("replace", args, 0, "text")?;
    let from = get_string_arg("replace", args, 1, "from")?;
    let to = get_string_arg("replace", args, 2, "to")?;
    if from.is_empty() {
        return Err(ExpressionError::invalid_argument(
            "replace",
            "argument 'from' must not be empty",
        ));
    }
    Ok(Value::String(s.replace(from, to)))
}

/// Split a string by a delimiter
pub fn split(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("split", args, 2)?;
    let s = get_string_arg("split", args, 0, "text")?;
    let delimiter = get_string_arg("split", args, 1, "delimiter")?;
    let parts = if delimiter.is_empty() {
        s.chars().map(|c| Value::String(c.to_string())).collect()
    } else {
        s.split(delimiter)
            .map(|part| Value::String(part.to_string()))
            .collect()
    };
    Ok(Value::Array(parts))
}

/// Characters from `start` up to (not including) `end`; indices are in
/// characters and clamp to the string
pub fn substring(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_range("substring", args, 2, 3)?;
    let s = get_string_arg("substring", args, 0, "text")?;
    let len = s.chars().count() as i64;
    let start = get_int_arg("substring", args, 1, "start")?.clamp(0, len);
    let end = if args.len() == 3 {
        get_int_arg("substring", args, 2, "end")?.clamp(start, len)
    } else {
        len
    };
    Ok(Value::String(
        s.chars()
            .skip(start as usize)
            .take((end - start) as usize)
            .collect(),
    ))
}

/// Length of a string (in characters), array or object; null has length 0
pub fn length(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("length", args, 1)?;
    let len = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::Null => 0,
        other => {
            return Err(ExpressionError::type_error(
                "string, array or object",
                value_type_name(other),
            ));
        }
    };
    Ok(Value::from(len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(upper, vec![json!("abc")], json!("ABC"))]
    #[case(lower, vec![json!("AbC")], json!("abc"))]
    #[case(trim, vec![json!("  x ")], json!("x"))]
    #[case(concat, vec![json!("a"), json!(1), Value::Null, json!(true)], json!("a1true"))]
    #[case(concat, vec![json!([1]), json!([2, 3])], json!([1, 2, 3]))]
    #[case(replace, vec![json!("a-b-c"), json!("-"), json!("+")], json!("a+b+c"))]
    #[case(split, vec![json!("a,b"), json!(",")], json!(["a", "b"]))]
    #[case(substring, vec![json!("héllo"), json!(1), json!(3)], json!("él"))]
    #[case(substring, vec![json!("hello"), json!(3)], json!("lo"))]
    #[case(substring, vec![json!("hello"), json!(4), json!(99)], json!("o"))]
    #[case(length, vec![json!("héllo")], json!(5))]
    #[case(length, vec![json!([1, 2])], json!(2))]
    #[case(length, vec![Value::Null], json!(0))]
    fn test_string_functions(
        #[case] func: fn(&[Value]) -> ExpressionResult<Value>,
        #[case] args: Vec<Value>,
        #[case] expected: Value,
    ) {
        assert_eq!(func(&args).unwrap(), expected);
    }

    #[test]
    fn test_type_errors() {
        assert!(upper(&[json!(1)]).is_err());
        assert!(length(&[json!(true)]).is_err());
        assert!(replace(&[json!("a"), json!(""), json!("b")]).is_err());
    }
}
