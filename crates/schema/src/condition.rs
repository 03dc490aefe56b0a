//! Boolean condition trees attached to fields.
//!
//! At the schema boundary a condition is an object tagged by `type`:
//!
//! ```json
//! {"type": "simple", "field": "role", "operator": "eq", "value": "admin"}
//! {"type": "and", "conditions": [...]}
//! {"type": "exists", "field": "email"}
//! {"type": "expression", "expression": "${is_empty(email)}"}
//! ```

use std::fmt;

use formwork_expression::ExpressionEngine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SchemaError, SchemaResult};

/// Comparison operator of a simple condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    #[default]
    #[serde(alias = "equals", alias = "==", alias = "=")]
    Eq,
    #[serde(alias = "not_equals", alias = "!=", alias = "<>")]
    Ne,
    #[serde(alias = "greater_than", alias = ">")]
    Gt,
    #[serde(alias = "greater_than_or_equal", alias = ">=")]
    Gte,
    #[serde(alias = "less_than", alias = "<")]
    Lt,
    #[serde(alias = "less_than_or_equal", alias = "<=")]
    Lte,
    Contains,
    #[serde(alias = "does_not_contain")]
    NotContains,
    #[serde(alias = "startswith")]
    StartsWith,
    #[serde(alias = "endswith")]
    EndsWith,
    #[serde(alias = "regex", alias = "match")]
    Matches,
    #[serde(alias = "one_of")]
    In,
    #[serde(alias = "not_one_of")]
    NotIn,
    #[serde(alias = "is_empty")]
    Empty,
    #[serde(alias = "is_not_empty")]
    NotEmpty,
    Exists,
    #[serde(alias = "not_exist")]
    NotExists,
}

impl Operator {
    /// Canonical wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::Matches => "matches",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::Empty => "empty",
            Self::NotEmpty => "not_empty",
            Self::Exists => "exists",
            Self::NotExists => "not_exists",
        }
    }

    /// Operators that ignore the right operand.
    #[must_use]
    pub fn is_unary(self) -> bool {
        matches!(
            self,
            Self::Empty | Self::NotEmpty | Self::Exists | Self::NotExists
        )
    }

    /// Operators whose right operand must be an array.
    #[must_use]
    pub fn expects_sequence(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }

    /// Ordering operators (numeric or temporal).
    #[must_use]
    pub fn is_ordering(self) -> bool {
        matches!(self, Self::Gt | Self::Gte | Self::Lt | Self::Lte)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A boolean decision tree controlling visibility, enablement, requirement
/// or conditional defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// Compare a field (or expression) against an operand.
    Simple {
        field: String,
        #[serde(default)]
        operator: Operator,
        #[serde(default)]
        value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        case_insensitive: Option<bool>,
    },
    /// All children must hold.
    And {
        #[serde(default)]
        conditions: Vec<Condition>,
    },
    /// At least one child must hold.
    Or {
        #[serde(default)]
        conditions: Vec<Condition>,
    },
    /// Negates its single child.
    Not {
        #[serde(default)]
        conditions: Vec<Condition>,
    },
    /// Field is present and non-empty.
    Exists { field: String },
    /// Truthiness of an arbitrary expression.
    Expression { expression: String },
}

impl Condition {
    pub fn simple(field: impl Into<String>, operator: Operator, value: Value) -> Self {
        Self::Simple {
            field: field.into(),
            operator,
            value,
            case_insensitive: None,
        }
    }

    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::simple(field, Operator::Eq, value)
    }

    pub fn and(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Self::And {
            conditions: conditions.into_iter().collect(),
        }
    }

    pub fn or(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Self::Or {
            conditions: conditions.into_iter().collect(),
        }
    }

    pub fn not(condition: Condition) -> Self {
        Self::Not {
            conditions: vec![condition],
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Self::Exists {
            field: field.into(),
        }
    }

    pub fn expression(expression: impl Into<String>) -> Self {
        Self::Expression {
            expression: expression.into(),
        }
    }

    /// Set the case-insensitive flag of a simple condition; other variants
    /// are returned unchanged.
    pub fn case_insensitive(mut self, flag: bool) -> Self {
        if let Self::Simple {
            case_insensitive, ..
        } = &mut self
        {
            *case_insensitive = Some(flag);
        }
        self
    }

    /// Wire name of the variant.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Simple { .. } => "simple",
            Self::And { .. } => "and",
            Self::Or { .. } => "or",
            Self::Not { .. } => "not",
            Self::Exists { .. } => "exists",
            Self::Expression { .. } => "expression",
        }
    }

    /// Visit this condition and every descendant, parents first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Condition)) {
        visit(self);
        if let Self::And { conditions } | Self::Or { conditions } | Self::Not { conditions } = self
        {
            for child in conditions {
                child.walk(visit);
            }
        }
    }

    /// Field names read directly by simple and exists nodes.
    ///
    /// A simple node whose `field` contains `${` is an expression and is
    /// reported by [`Condition::expressions`] instead.
    #[must_use]
    pub fn field_references(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        self.walk(&mut |node| match node {
            Self::Simple { field, .. } | Self::Exists { field }
                if !ExpressionEngine::is_expression(field) =>
            {
                fields.push(field.as_str());
            }
            _ => {}
        });
        fields
    }

    /// Expression templates embedded anywhere in the tree, including
    /// fragment-bearing operands. Bare expression bodies come back wrapped
    /// in `${...}`.
    #[must_use]
    pub fn expressions(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.walk(&mut |node| match node {
            Self::Simple { field, value, .. } => {
                let mut found = Vec::new();
                if ExpressionEngine::is_expression(field) {
                    found.push(field.as_str());
                }
                collect_template_strings(value, &mut found);
                out.extend(found.into_iter().map(str::to_string));
            }
            Self::Expression { expression } => out.push(as_template(expression)),
            _ => {}
        });
        out
    }

    /// Check well-formedness without evaluating anything.
    pub fn validate(&self, path: &str) -> SchemaResult<()> {
        self.validate_with(path, &ExpressionEngine::without_cache())
    }

    pub(crate) fn validate_with(&self, path: &str, engine: &ExpressionEngine) -> SchemaResult<()> {
        match self {
            Self::And { conditions } | Self::Or { conditions } => {
                if conditions.is_empty() {
                    return Err(SchemaError::structural(
                        path,
                        format!("`{}` needs at least one child", self.kind_name()),
                    ));
                }
                validate_children(conditions, path, engine)
            }
            Self::Not { conditions } => {
                if conditions.len() != 1 {
                    return Err(SchemaError::structural(
                        path,
                        format!("`not` needs exactly one child, found {}", conditions.len()),
                    ));
                }
                validate_children(conditions, path, engine)
            }
            Self::Exists { field } => require_field(field, path, engine),
            Self::Expression { expression } => {
                if expression.trim().is_empty() {
                    return Err(SchemaError::structural(path, "empty expression"));
                }
                check_expression_syntax(&as_template(expression), path, engine)
            }
            Self::Simple {
                field,
                operator,
                value,
                ..
            } => {
                require_field(field, path, engine)?;
                if let Value::String(text) = value
                    && ExpressionEngine::is_expression(text)
                {
                    return check_expression_syntax(text, path, engine);
                }
                if operator.expects_sequence() && !value.is_array() {
                    return Err(SchemaError::structural(
                        path,
                        format!("operator `{operator}` needs an array operand"),
                    ));
                }
                if *operator == Operator::Matches {
                    let Value::String(pattern) = value else {
                        return Err(SchemaError::structural(
                            path,
                            "operator `matches` needs a string pattern",
                        ));
                    };
                    regex::Regex::new(pattern).map_err(|e| {
                        SchemaError::structural(path, format!("invalid pattern `{pattern}`: {e}"))
                    })?;
                }
                Ok(())
            }
        }
    }
}

/// Wrap a bare expression body so it can be evaluated as a template.
///
/// `age` and `${age}` are equivalent as expression conditions.
#[must_use]
pub fn as_template(expression: &str) -> String {
    if ExpressionEngine::is_expression(expression) {
        expression.to_string()
    } else {
        format!("${{{}}}", expression.trim())
    }
}

fn validate_children(
    conditions: &[Condition],
    path: &str,
    engine: &ExpressionEngine,
) -> SchemaResult<()> {
    conditions
        .iter()
        .enumerate()
        .try_for_each(|(i, child)| child.validate_with(&format!("{path}.conditions[{i}]"), engine))
}

fn require_field(field: &str, path: &str, engine: &ExpressionEngine) -> SchemaResult<()> {
    if field.trim().is_empty() {
        return Err(SchemaError::structural(path, "condition needs a field"));
    }
    if ExpressionEngine::is_expression(field) {
        check_expression_syntax(field, path, engine)?;
    }
    Ok(())
}

fn check_expression_syntax(text: &str, path: &str, engine: &ExpressionEngine) -> SchemaResult<()> {
    engine
        .check_syntax(text)
        .map_err(|e| SchemaError::structural(path, e.to_string()))
}

pub(crate) fn collect_template_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(text) if ExpressionEngine::is_expression(text) => out.push(text),
        Value::Array(items) => items.iter().for_each(|v| collect_template_strings(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_template_strings(v, out)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("eq", Operator::Eq)]
    #[case("equals", Operator::Eq)]
    #[case("==", Operator::Eq)]
    #[case("!=", Operator::Ne)]
    #[case(">=", Operator::Gte)]
    #[case("less_than", Operator::Lt)]
    #[case("not_in", Operator::NotIn)]
    #[case("regex", Operator::Matches)]
    #[case("is_empty", Operator::Empty)]
    fn operator_aliases(#[case] wire: &str, #[case] expected: Operator) {
        let op: Operator = serde_json::from_value(json!(wire)).unwrap();
        assert_eq!(op, expected);
    }

    #[test]
    fn deserializes_boundary_shape() {
        let condition: Condition = serde_json::from_value(json!({
            "type": "and",
            "conditions": [
                {"type": "simple", "field": "role", "operator": "eq", "value": "admin"},
                {"type": "not", "conditions": [{"type": "exists", "field": "banned"}]},
                {"type": "expression", "expression": "${age}"}
            ]
        }))
        .unwrap();

        assert_eq!(
            condition,
            Condition::and([
                Condition::eq("role", json!("admin")),
                Condition::not(Condition::exists("banned")),
                Condition::expression("${age}"),
            ])
        );
    }

    #[test]
    fn simple_defaults_to_eq_null() {
        let condition: Condition =
            serde_json::from_value(json!({"type": "simple", "field": "x"})).unwrap();
        assert_eq!(condition, Condition::eq("x", Value::Null));
    }

    #[test]
    fn references_and_expressions() {
        let condition = Condition::or([
            Condition::eq("country", json!("NO")),
            Condition::simple("${upper(code)}", Operator::Eq, json!("${expected}")),
            Condition::not(Condition::exists("email")),
            Condition::expression("adult"),
        ]);
        assert_eq!(condition.field_references(), vec!["country", "email"]);
        assert_eq!(
            condition.expressions(),
            vec!["${upper(code)}", "${expected}", "${adult}"]
        );
    }

    #[rstest]
    #[case(Condition::and([]), "`and` needs at least one child")]
    #[case(Condition::or([]), "`or` needs at least one child")]
    #[case(Condition::Not { conditions: vec![] }, "`not` needs exactly one child, found 0")]
    #[case(Condition::exists(""), "condition needs a field")]
    #[case(Condition::simple("x", Operator::In, json!("a")), "operator `in` needs an array operand")]
    #[case(Condition::simple("x", Operator::Matches, json!(3)), "operator `matches` needs a string pattern")]
    #[case(Condition::expression("  "), "empty expression")]
    fn structural_errors(#[case] condition: Condition, #[case] message: &str) {
        let err = condition.validate("f.visible_when").unwrap_err();
        assert_eq!(err, SchemaError::structural("f.visible_when", message));
    }

    #[test]
    fn nested_error_paths_and_syntax() {
        let condition = Condition::and([Condition::eq("a", json!(1)), Condition::or([])]);
        let err = condition.validate("f").unwrap_err();
        assert_eq!(
            err,
            SchemaError::structural("f.conditions[1]", "`or` needs at least one child")
        );

        assert!(Condition::expression("${a b}").validate("f").is_err());
        assert!(Condition::simple("x", Operator::Matches, json!("(")).validate("f").is_err());
        assert!(Condition::simple("x", Operator::In, json!("${allowed}")).validate("f").is_ok());
        assert!(Condition::expression("user.active").validate("f").is_ok());
    }

    #[test]
    fn bare_expression_becomes_template() {
        assert_eq!(as_template("user.active"), "${user.active}");
        assert_eq!(as_template("${a} ok"), "${a} ok");
    }
}
