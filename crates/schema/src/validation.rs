use formwork_expression::value_utils::{number_as_f64, value_type_name, values_equal};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A declarative validation rule attached to a field.
///
/// Rules skip null values; requirement is handled by the field's
/// `required` flag. `Custom` rules are expressions evaluated by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ValidationRule {
    /// String (in characters) or array must have at least `length` items.
    MinLength {
        length: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// String (in characters) or array must have at most `length` items.
    MaxLength {
        length: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// String must match the given regex pattern.
    Pattern {
        pattern: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Numeric value must be >= `value`.
    Min {
        value: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Numeric value must be <= `value`.
    Max {
        value: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Value must be one of the given allowed values.
    OneOf {
        values: Vec<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Expression that must be truthy; `value` is bound to the field value.
    Custom {
        expression: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

/// A failed rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub rule: &'static str,
    pub message: String,
}

impl ValidationRule {
    #[must_use]
    pub fn min_length(length: usize) -> Self {
        Self::MinLength {
            length,
            message: None,
        }
    }

    #[must_use]
    pub fn max_length(length: usize) -> Self {
        Self::MaxLength {
            length,
            message: None,
        }
    }

    #[must_use]
    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            message: None,
        }
    }

    #[must_use]
    pub fn min(value: f64) -> Self {
        Self::Min {
            value,
            message: None,
        }
    }

    #[must_use]
    pub fn max(value: f64) -> Self {
        Self::Max {
            value,
            message: None,
        }
    }

    #[must_use]
    pub fn one_of(values: impl IntoIterator<Item = Value>) -> Self {
        Self::OneOf {
            values: values.into_iter().collect(),
            message: None,
        }
    }

    #[must_use]
    pub fn custom(expression: impl Into<String>) -> Self {
        Self::Custom {
            expression: expression.into(),
            message: None,
        }
    }

    /// Replace the default failure message.
    #[must_use]
    pub fn with_message(mut self, text: impl Into<String>) -> Self {
        match &mut self {
            Self::MinLength { message, .. }
            | Self::MaxLength { message, .. }
            | Self::Pattern { message, .. }
            | Self::Min { message, .. }
            | Self::Max { message, .. }
            | Self::OneOf { message, .. }
            | Self::Custom { message, .. } => *message = Some(text.into()),
        }
        self
    }

    /// Wire name of the rule.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::MinLength { .. } => "min_length",
            Self::MaxLength { .. } => "max_length",
            Self::Pattern { .. } => "pattern",
            Self::Min { .. } => "min",
            Self::Max { .. } => "max",
            Self::OneOf { .. } => "one_of",
            Self::Custom { .. } => "custom",
        }
    }

    /// The configured message, or a generated default.
    #[must_use]
    pub fn message(&self) -> String {
        let custom = match self {
            Self::MinLength { message, .. }
            | Self::MaxLength { message, .. }
            | Self::Pattern { message, .. }
            | Self::Min { message, .. }
            | Self::Max { message, .. }
            | Self::OneOf { message, .. }
            | Self::Custom { message, .. } => message,
        };
        if let Some(text) = custom {
            return text.clone();
        }
        match self {
            Self::MinLength { length, .. } => format!("must have at least {length} characters"),
            Self::MaxLength { length, .. } => format!("must have at most {length} characters"),
            Self::Pattern { pattern, .. } => format!("must match pattern `{pattern}`"),
            Self::Min { value, .. } => format!("must be at least {value}"),
            Self::Max { value, .. } => format!("must be at most {value}"),
            Self::OneOf { .. } => "must be one of the allowed values".to_string(),
            Self::Custom { expression, .. } => format!("must satisfy `{expression}`"),
        }
    }

    /// Check `value` against this rule.
    ///
    /// Null values pass. `Custom` always passes here.
    #[must_use]
    pub fn check(&self, value: &Value) -> Option<Violation> {
        if value.is_null() {
            return None;
        }
        let passed = match self {
            Self::MinLength { length, .. } => measure(value).is_none_or(|n| n >= *length),
            Self::MaxLength { length, .. } => measure(value).is_none_or(|n| n <= *length),
            Self::Pattern { pattern, .. } => match value {
                Value::String(text) => regex::Regex::new(pattern).is_ok_and(|re| re.is_match(text)),
                _ => false,
            },
            Self::Min { value: min, .. } => numeric(value).is_some_and(|n| n >= *min),
            Self::Max { value: max, .. } => numeric(value).is_some_and(|n| n <= *max),
            Self::OneOf { values, .. } => values.iter().any(|allowed| values_equal(allowed, value)),
            Self::Custom { .. } => true,
        };
        if passed {
            None
        } else {
            tracing::trace!(rule = self.name(), value_type = value_type_name(value), "rule failed");
            Some(self.violation())
        }
    }

    /// A violation carrying this rule's message.
    #[must_use]
    pub fn violation(&self) -> Violation {
        Violation {
            rule: self.name(),
            message: self.message(),
        }
    }
}

fn measure(value: &Value) -> Option<usize> {
    match value {
        Value::String(text) => Some(text.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => number_as_f64(n),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
