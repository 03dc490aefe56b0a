//! Utility functions for working with serde_json::Value

use serde_json::{Number, Value};

/// Get the type name of a Value for error messages
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Extract f64 from Number, trying both f64 and i64 representations
#[inline]
pub fn number_as_f64(num: &Number) -> Option<f64> {
    num.as_f64().or_else(|| num.as_i64().map(|i| i as f64))
}

/// Build a Number from an f64, collapsing whole values back to integers.
pub fn number_from_f64(f: f64) -> Value {
    if f.fract() == 0.0 && f.is_finite() && f.abs() < 9.0e15 {
        Value::Number((f as i64).into())
    } else {
        Number::from_f64(f).map_or(Value::Null, Value::Number)
    }
}

/// Truthiness: false, 0, NaN, empty string, empty collection and null are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => number_as_f64(n).is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(arr) => !arr.is_empty(),
        Value::Object(obj) => !obj.is_empty(),
    }
}

/// Emptiness as used by `exists`, `empty` and `is_empty`.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(arr) => arr.is_empty(),
        Value::Object(obj) => obj.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// String form used when a fragment is substituted into surrounding text.
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Structural equality with numeric normalisation, so `1 == 1.0`.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (number_as_f64(a), number_as_f64(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| values_equal(v, other)))
        }
        _ => left == right,
    }
}

/// Convert Value to f64, accepting numeric strings and booleans
pub fn to_float(value: &Value) -> Result<f64, &'static str> {
    match value {
        Value::Number(n) => number_as_f64(n).ok_or("number cannot be represented as float"),
        Value::String(s) => s.trim().parse().map_err(|_| "string is not a valid number"),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        _ => Err("value cannot be converted to number"),
    }
}

/// Parse a dotted/indexed path such as `user.tags[0]` into segments.
///
/// Returns `None` when the text is not a plain path.
pub fn parse_plain_path(path: &str) -> Option<Vec<PathSegment>> {
    let mut segments = Vec::new();
    let mut chars = path.char_indices().peekable();
    let mut current = String::new();

    while let Some((_, ch)) = chars.next() {
        match ch {
            '.' => {
                if current.is_empty() {
                    // `a[0].b` has no key between `]` and `.`
                    if !matches!(segments.last(), Some(PathSegment::Index(_))) {
                        return None;
                    }
                } else {
                    segments.push(PathSegment::Key(std::mem::take(&mut current)));
                }
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current)));
                }
                let mut index = String::new();
                loop {
                    match chars.next() {
                        Some((_, ']')) => break,
                        Some((_, c)) => index.push(c),
                        None => return None,
                    }
                }
                let index = index.trim();
                if let Ok(i) = index.parse::<i64>() {
                    segments.push(PathSegment::Index(i));
                } else {
                    let key = index
                        .strip_prefix('"')
                        .and_then(|s| s.strip_suffix('"'))
                        .or_else(|| index.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))?;
                    segments.push(PathSegment::Key(key.to_string()));
                }
            }
            c if c.is_alphanumeric() || c == '_' || c == '-' => current.push(c),
            _ => return None,
        }
    }
    if !current.is_empty() {
        segments.push(PathSegment::Key(current));
    }
    if segments.is_empty() {
        None
    } else {
        Some(segments)
    }
}

/// One step of a value path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object key
    Key(String),
    /// Array index; negative counts from the end
    Index(i64),
}

/// Walk a value along `segments`. Missing keys and out-of-range indices yield `None`.
pub fn get_path<'a>(value: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(value, |current, segment| match (current, segment) {
            (Value::Object(map), PathSegment::Key(key)) => map.get(key),
            (Value::Array(items), PathSegment::Index(i)) => items.get(normalize_index(*i, items.len())?),
            (Value::Array(items), PathSegment::Key(key)) => {
                let i = key.parse::<i64>().ok()?;
                items.get(normalize_index(i, items.len())?)
            }
            _ => None,
        })
}

/// Resolve a possibly negative index against a length.
pub fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let resolved = if index < 0 {
        len as i64 + index
    } else {
        index
    };
    if resolved < 0 || resolved as usize >= len {
        None
    } else {
        Some(resolved as usize)
    }
}
