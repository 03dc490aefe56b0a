//! Date and time functions

use super::check_arg_count;
use crate::error::ExpressionResult;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// Current UTC time as an RFC 3339 string
pub fn now(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("now", args, 0)?;
    Ok(Value::String(Utc::now().to_rfc3339()))
}

/// Current UTC date as `YYYY-MM-DD`
pub fn today(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("today", args, 0)?;
    Ok(Value::String(Utc::now().date_naive().format("%Y-%m-%d").to_string()))
}

/// Parse an RFC 3339 date-time, a naive `YYYY-MM-DDTHH:MM:SS` date-time or
/// a `YYYY-MM-DD` date into a UTC instant. Naive values are taken as UTC.
pub fn parse_temporal(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
