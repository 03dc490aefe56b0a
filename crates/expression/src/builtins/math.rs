//! Math functions

use super::{check_arg_count, check_arg_range, get_int_arg, get_number_arg, numeric_operands};
use crate::error::{ExpressionError, ExpressionResult};
use crate::value_utils::number_from_f64;
use serde_json::Value;

/// Absolute value
pub fn abs(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("abs", args, 1)?;
    Ok(number_from_f64(get_number_arg("abs", args, 0, "number")?.abs()))
}

/// Round to specified decimal places (default: 0)
pub fn round(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_range("round", args, 1, 2)?;
    let num = get_number_arg("round", args, 0, "number")?;
    if args.len() == 2 {
        let decimals = get_int_arg("round", args, 1, "decimals")?.clamp(0, 15) as i32;
        let multiplier = 10_f64.powi(decimals);
        Ok(number_from_f64((num * multiplier).round() / multiplier))
    } else {
        Ok(number_from_f64(num.round()))
    }
}

/// Floor function
pub fn floor(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("floor", args, 1)?;
    Ok(number_from_f64(get_number_arg("floor", args, 0, "number")?.floor()))
}

/// Ceiling function
pub fn ceil(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("ceil", args, 1)?;
    Ok(number_from_f64(get_number_arg("ceil", args, 0, "number")?.ceil()))
}

/// Minimum of the arguments or of a single array
pub fn min(args: &[Value]) -> ExpressionResult<Value> {
    numeric_operands("min", args)?
        .into_iter()
        .reduce(f64::min)
        .map(number_from_f64)
        .ok_or_else(|| ExpressionError::invalid_argument("min", "expected at least one number"))
}

/// Maximum of the arguments or of a single array
pub fn max(args: &[Value]) -> ExpressionResult<Value> {
    numeric_operands("max", args)?
        .into_iter()
        .reduce(f64::max)
        .map(number_from_f64)
        .ok_or_else(|| ExpressionError::invalid_argument("max", "expected at least one number"))
}

/// Sum of the arguments or of a single array; an empty sum is 0
pub fn sum(args: &[Value]) -> ExpressionResult<Value> {
    Ok(number_from_f64(numeric_operands("sum", args)?.into_iter().sum()))
}
