//! Condition evaluation.
//!
//! A simple condition reads its left operand by name (or evaluates it when
//! it contains `${`), evaluates a fragment-bearing right operand, and
//! compares the two. An absent field never satisfies a negative operator:
//! `ne`, `not_in` and `not_contains` are false for an unset field.

use std::cmp::Ordering;
use std::sync::Arc;

use formwork_expression::builtins::datetime::parse_temporal;
use formwork_expression::value_utils::{
    is_empty, is_truthy, number_as_f64, value_type_name, values_equal,
};
use formwork_expression::{EvaluationContext, ExpressionEngine, ExpressionError};
use formwork_schema::condition::as_template;
use formwork_schema::{Condition, Operator};
use serde_json::Value;

use crate::error::{EngineError, EngineResult};

/// Evaluates condition trees against an [`EvaluationContext`].
#[derive(Debug, Clone)]
pub struct ConditionEvaluator {
    expressions: Arc<ExpressionEngine>,
    case_insensitive: bool,
}

impl ConditionEvaluator {
    pub fn new(expressions: Arc<ExpressionEngine>) -> Self {
        Self {
            expressions,
            case_insensitive: false,
        }
    }

    /// Default applied to simple conditions without their own flag.
    pub fn with_case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }

    /// Evaluate `condition`.
    ///
    /// `and` stops at the first false child or the first error. `or` stops at
    /// the first true child and fails only when every child failed, with the
    /// last error.
    pub fn evaluate(&self, condition: &Condition, context: &EvaluationContext) -> EngineResult<bool> {
        let result = match condition {
            Condition::Simple {
                field,
                operator,
                value,
                case_insensitive,
            } => {
                let left = self.operand(field, context)?;
                let right = self.literal(value, context)?;
                compare(
                    *operator,
                    left.as_ref(),
                    &right,
                    case_insensitive.unwrap_or(self.case_insensitive),
                )
            }
            Condition::And { conditions } => {
                for child in conditions {
                    if !self.evaluate(child, context)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Condition::Or { conditions } => {
                let mut last_error = None;
                let mut any_false = false;
                for child in conditions {
                    match self.evaluate(child, context) {
                        Ok(true) => return Ok(true),
                        Ok(false) => any_false = true,
                        Err(err) => last_error = Some(err),
                    }
                }
                match last_error {
                    Some(err) if !any_false => Err(err),
                    _ => Ok(false),
                }
            }
            Condition::Not { conditions } => match conditions.as_slice() {
                [child] => self.evaluate(child, context).map(|b| !b),
                _ => Err(EngineError::structural(format!(
                    "`not` needs exactly one child, found {}",
                    conditions.len()
                ))),
            },
            Condition::Exists { field } => Ok(self
                .operand(field, context)?
                .is_some_and(|value| !is_empty(&value))),
            Condition::Expression { expression } => {
                match self.expressions.evaluate(&as_template(expression), context) {
                    Ok(value) => Ok(is_truthy(&value)),
                    Err(ExpressionError::UnresolvedReference { .. }) => Ok(false),
                    Err(err) => Err(err.into()),
                }
            }
        };
        tracing::trace!(kind = condition.kind_name(), result = ?result, "condition evaluated");
        result
    }

    /// Evaluate `condition`, logging failures and answering `default` instead.
    pub fn evaluate_or(
        &self,
        condition: &Condition,
        context: &EvaluationContext,
        default: bool,
    ) -> bool {
        self.evaluate(condition, context).unwrap_or_else(|err| {
            tracing::warn!(error = %err, default, "condition failed, using default");
            default
        })
    }

    /// Structural well-formedness check; nothing is evaluated.
    pub fn validate(&self, condition: &Condition) -> EngineResult<()> {
        condition.validate("condition").map_err(EngineError::from)
    }

    /// Left operand: `None` when the field is absent or null.
    fn operand(&self, field: &str, context: &EvaluationContext) -> EngineResult<Option<Value>> {
        let value = if ExpressionEngine::is_expression(field) {
            match self.expressions.evaluate(field, context) {
                Ok(value) => Some(value),
                Err(ExpressionError::UnresolvedReference { .. }) => None,
                Err(err) => return Err(err.into()),
            }
        } else {
            context.lookup_path(field)
        };
        Ok(value.filter(|value| !value.is_null()))
    }

    fn literal(&self, value: &Value, context: &EvaluationContext) -> EngineResult<Value> {
        match value {
            Value::String(text) if ExpressionEngine::is_expression(text) => {
                Ok(self.expressions.evaluate(text, context)?)
            }
            other => Ok(other.clone()),
        }
    }
}

/// Apply `operator` to an optional left operand.
pub fn compare(
    operator: Operator,
    left: Option<&Value>,
    right: &Value,
    case_insensitive: bool,
) -> EngineResult<bool> {
    let Some(left) = left else {
        return Ok(match operator {
            Operator::Eq => right.is_null(),
            Operator::Empty | Operator::NotExists => true,
            _ => false,
        });
    };

    match operator {
        Operator::Eq => Ok(equal(left, right, case_insensitive)),
        Operator::Ne => Ok(!equal(left, right, case_insensitive)),
        Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
            if left.is_null() || right.is_null() {
                return Ok(false);
            }
            let ordering = order(operator, left, right)?;
            Ok(match operator {
                Operator::Gt => ordering == Ordering::Greater,
                Operator::Gte => ordering != Ordering::Less,
                Operator::Lt => ordering == Ordering::Less,
                _ => ordering != Ordering::Greater,
            })
        }
        Operator::Contains => contains(left, right, case_insensitive),
        Operator::NotContains => contains(left, right, case_insensitive).map(|b| !b),
        Operator::StartsWith | Operator::EndsWith => {
            let (text, affix) = strings(operator, left, right)?;
            let (text, affix) = fold(text, affix, case_insensitive);
            Ok(if operator == Operator::StartsWith {
                text.starts_with(affix.as_str())
            } else {
                text.ends_with(affix.as_str())
            })
        }
        Operator::Matches => {
            let (text, pattern) = strings(operator, left, right)?;
            let regex = regex::RegexBuilder::new(pattern)
                .case_insensitive(case_insensitive)
                .build()
                .map_err(|e| EngineError::structural(format!("invalid pattern `{pattern}`: {e}")))?;
            Ok(regex.is_match(text))
        }
        Operator::In | Operator::NotIn => {
            let Value::Array(candidates) = right else {
                return Err(EngineError::type_error(
                    operator.as_str(),
                    "array",
                    value_type_name(right),
                ));
            };
            let found = candidates
                .iter()
                .any(|candidate| equal(left, candidate, case_insensitive));
            Ok(found == (operator == Operator::In))
        }
        Operator::Empty | Operator::NotExists => Ok(is_empty(left)),
        Operator::NotEmpty | Operator::Exists => Ok(!is_empty(left)),
    }
}

fn equal(left: &Value, right: &Value, case_insensitive: bool) -> bool {
    match (left, right) {
        (Value::String(a), Value::String(b)) if case_insensitive => a.to_lowercase() == b.to_lowercase(),
        _ => values_equal(left, right),
    }
}

/// Numeric ordering when both sides coerce to numbers, else temporal
/// ordering when both parse as dates.
fn order(operator: Operator, left: &Value, right: &Value) -> EngineResult<Ordering> {
    if let (Some(a), Some(b)) = (numeric(left), numeric(right))
        && let Some(ordering) = a.partial_cmp(&b)
    {
        return Ok(ordering);
    }
    if let (Value::String(a), Value::String(b)) = (left, right)
        && let (Some(a), Some(b)) = (parse_temporal(a), parse_temporal(b))
    {
        return Ok(a.cmp(&b));
    }
    let actual = if numeric(left).is_some() {
        value_type_name(right)
    } else {
        value_type_name(left)
    };
    Err(EngineError::type_error(operator.as_str(), "number or date", actual))
}

/// Numbers and numeric strings; booleans do not order.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => number_as_f64(n),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn contains(left: &Value, right: &Value, case_insensitive: bool) -> EngineResult<bool> {
    match (left, right) {
        (Value::String(text), Value::String(needle)) => {
            let (text, needle) = fold(text, needle, case_insensitive);
            Ok(text.contains(needle.as_str()))
        }
        (Value::Array(items), needle) => Ok(items
            .iter()
            .any(|item| equal(item, needle, case_insensitive))),
        (Value::String(_), other) | (other, _) => Err(EngineError::type_error(
            "contains",
            "string or array",
            value_type_name(other),
        )),
    }
}

fn strings<'a>(operator: Operator, left: &'a Value, right: &'a Value) -> EngineResult<(&'a str, &'a str)> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Ok((a, b)),
        (Value::String(_), other) | (other, _) => Err(EngineError::type_error(
            operator.as_str(),
            "string",
            value_type_name(other),
        )),
    }
}

fn fold(text: &str, other: &str, case_insensitive: bool) -> (String, String) {
    if case_insensitive {
        (text.to_lowercase(), other.to_lowercase())
    } else {
        (text.to_string(), other.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formwork_expression::Registry;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn evaluator() -> ConditionEvaluator {
        ConditionEvaluator::new(Arc::new(ExpressionEngine::new()))
    }

    fn ctx(data: Value) -> EvaluationContext {
        EvaluationContext::builder(Arc::new(Registry::with_builtins()))
            .data(data)
            .build()
    }

    #[rstest]
    #[case(Operator::Eq, json!(1), json!(1.0), true)]
    #[case(Operator::Ne, json!("a"), json!("b"), true)]
    #[case(Operator::Gt, json!(10), json!("9"), true)]
    #[case(Operator::Lte, json!(3), json!(3), true)]
    #[case(Operator::Lt, json!("2024-01-31"), json!("2024-02-01T00:00:00Z"), true)]
    #[case(Operator::Gte, json!("2024-03-01"), json!("2024-03-02"), false)]
    #[case(Operator::Contains, json!("hello world"), json!("lo w"), true)]
    #[case(Operator::Contains, json!(["a", "b"]), json!("b"), true)]
    #[case(Operator::NotContains, json!(["a", "b"]), json!("c"), true)]
    #[case(Operator::StartsWith, json!("formwork"), json!("form"), true)]
    #[case(Operator::EndsWith, json!("formwork"), json!("form"), false)]
    #[case(Operator::Matches, json!("0150"), json!(r"^\d{4}$"), true)]
    #[case(Operator::In, json!("NO"), json!(["NO", "SE"]), true)]
    #[case(Operator::NotIn, json!(2), json!([1, 2]), false)]
    #[case(Operator::Empty, json!([]), Value::Null, true)]
    #[case(Operator::NotEmpty, json!({"a": 1}), Value::Null, true)]
    #[case(Operator::Exists, json!(""), Value::Null, false)]
    #[case(Operator::NotExists, json!(0), Value::Null, false)]
    fn operators(#[case] op: Operator, #[case] left: Value, #[case] right: Value, #[case] expected: bool) {
        assert_eq!(compare(op, Some(&left), &right, false).unwrap(), expected);
    }

    #[rstest]
    #[case(Operator::Eq, Value::Null, true)]
    #[case(Operator::Eq, json!("x"), false)]
    #[case(Operator::Ne, json!("x"), false)]
    #[case(Operator::NotIn, json!(["x"]), false)]
    #[case(Operator::NotContains, json!("x"), false)]
    #[case(Operator::Gt, json!(1), false)]
    #[case(Operator::Exists, Value::Null, false)]
    #[case(Operator::NotExists, Value::Null, true)]
    #[case(Operator::Empty, Value::Null, true)]
    #[case(Operator::NotEmpty, Value::Null, false)]
    fn absent_field(#[case] op: Operator, #[case] right: Value, #[case] expected: bool) {
        assert_eq!(compare(op, None, &right, false).unwrap(), expected);
    }

    #[rstest]
    #[case(Operator::Ne, json!("admin"), false)]
    #[case(Operator::NotIn, json!(["admin"]), false)]
    #[case(Operator::NotContains, json!("adm"), false)]
    #[case(Operator::Eq, Value::Null, true)]
    #[case(Operator::Eq, json!("admin"), false)]
    #[case(Operator::NotExists, Value::Null, true)]
    fn null_value_counts_as_absent(#[case] op: Operator, #[case] right: Value, #[case] expected: bool) {
        let condition = Condition::simple("role", op, right.clone());
        let data = json!({"role": null});
        assert_eq!(evaluator().evaluate(&condition, &ctx(data)).unwrap(), expected);

        let through_expression = Condition::simple("${role}", op, right);
        assert_eq!(
            evaluator().evaluate(&through_expression, &ctx(json!({"role": null}))).unwrap(),
            expected
        );
    }

    #[rstest]
    #[case(Operator::Gt, json!(true), json!(1))]
    #[case(Operator::Lt, json!("abc"), json!("2024-01-01"))]
    #[case(Operator::StartsWith, json!(5), json!("5"))]
    #[case(Operator::In, json!("a"), json!("abc"))]
    #[case(Operator::Contains, json!(5), json!(5))]
    fn type_errors(#[case] op: Operator, #[case] left: Value, #[case] right: Value) {
        let err = compare(op, Some(&left), &right, false).unwrap_err();
        assert_eq!(err.code(), "ENGINE:TYPE");
    }

    #[test]
    fn case_insensitive_flag() {
        let condition = Condition::eq("name", json!("ANN")).case_insensitive(true);
        assert!(evaluator().evaluate(&condition, &ctx(json!({"name": "ann"}))).unwrap());

        let evaluator = evaluator().with_case_insensitive(true);
        let condition = Condition::simple("name", Operator::StartsWith, json!("AN"));
        assert!(evaluator.evaluate(&condition, &ctx(json!({"name": "ann"}))).unwrap());
        let condition = condition.case_insensitive(false);
        assert!(!evaluator.evaluate(&condition, &ctx(json!({"name": "ann"}))).unwrap());
    }

    #[test]
    fn role_mismatch_is_false() {
        let condition: Condition = serde_json::from_value(
            json!({"type": "simple", "field": "role", "operator": "eq", "value": "admin"}),
        )
        .unwrap();
        assert!(!evaluator().evaluate(&condition, &ctx(json!({"role": "user"}))).unwrap());
    }

    #[rstest]
    #[case(json!({"email": ""}), false)]
    #[case(json!({"email": "a@b.com"}), true)]
    #[case(json!({}), false)]
    #[case(json!({"email": null}), false)]
    #[case(json!({"email": []}), false)]
    #[case(json!({"email": {}}), false)]
    fn exists_means_present_and_non_empty(#[case] data: Value, #[case] expected: bool) {
        let condition = Condition::exists("email");
        assert_eq!(evaluator().evaluate(&condition, &ctx(data)).unwrap(), expected);
    }

    #[test]
    fn empty_and_or() {
        let ctx = ctx(json!({}));
        assert!(evaluator().evaluate(&Condition::and([]), &ctx).unwrap());
        assert!(!evaluator().evaluate(&Condition::or([]), &ctx).unwrap());
    }

    #[test]
    fn and_stops_at_first_error_or_false() {
        let ctx = ctx(json!({"n": true, "code": "x1"}));
        let bad = Condition::simple("n", Operator::Gt, json!(1));
        let t = Condition::exists("n");
        let f = Condition::not(Condition::exists("n"));

        assert!(evaluator().evaluate(&Condition::and([t.clone(), bad.clone()]), &ctx).is_err());
        assert!(!evaluator().evaluate(&Condition::and([f.clone(), bad.clone()]), &ctx).unwrap());
        assert!(evaluator().evaluate(&Condition::or([bad.clone(), t]), &ctx).unwrap());
        assert!(!evaluator().evaluate(&Condition::or([bad.clone(), f]), &ctx).unwrap());

        let err = evaluator()
            .evaluate(
                &Condition::or([bad, Condition::simple("code", Operator::Matches, json!("("))]),
                &ctx,
            )
            .unwrap_err();
        assert_eq!(err.code(), "ENGINE:STRUCTURAL");
    }

    #[test]
    fn expressions_on_both_sides() {
        let ctx = ctx(json!({"user": {"name": "ann", "roles": ["admin"]}, "wanted": "ANN"}));
        let condition = Condition::simple("${upper(user.name)}", Operator::Eq, json!("${wanted}"));
        assert!(evaluator().evaluate(&condition, &ctx).unwrap());

        assert!(evaluator().evaluate(&Condition::expression("includes(user.roles, 'admin')"), &ctx).unwrap());
        assert!(!evaluator().evaluate(&Condition::expression("${missing}"), &ctx).unwrap());
        assert!(evaluator().evaluate(&Condition::expression("${nope()}"), &ctx).is_err());
    }

    #[test]
    fn not_requires_one_child() {
        let condition = Condition::Not { conditions: vec![] };
        assert!(evaluator().evaluate(&condition, &ctx(json!({}))).is_err());
        assert!(evaluator().validate(&condition).is_err());
        assert!(evaluator().evaluate_or(&condition, &ctx(json!({})), true));
    }

    #[test]
    fn nested_paths() {
        let ctx = ctx(json!({"address": {"city": "Oslo"}, "tags": ["a", "b"]}));
        assert!(evaluator().evaluate(&Condition::eq("address.city", json!("Oslo")), &ctx).unwrap());
        assert!(evaluator().evaluate(&Condition::eq("tags[-1]", json!("b")), &ctx).unwrap());
        assert!(!evaluator().evaluate(&Condition::exists("address.zip"), &ctx).unwrap());
    }
}
