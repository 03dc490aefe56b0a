//! Template resolution over arbitrary nested values.
//!
//! Strings carrying `${...}` fragments are evaluated; arrays and objects are
//! walked element by element. Nesting is bounded by
//! [`ResolveOptions::max_depth`] and each expression source is guarded
//! against resolving itself again while it is still in progress.

use std::sync::Arc;

use formwork_expression::{
    EvaluationContext, ExpressionEngine, ExpressionError, FailureMode, Registry,
};
use formwork_expression::value_utils::to_display_string;
use formwork_schema::{DefaultValue, FieldSpec};
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::condition::ConditionEvaluator;
use crate::config::DEFAULT_MAX_DEPTH;
use crate::error::EngineResult;

/// How a single resolution call treats failures and nesting.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveOptions {
    /// Propagate expression failures instead of substituting.
    pub strict: bool,
    /// Re-resolve results that still contain fragments.
    pub recursive: bool,
    pub max_depth: usize,
    /// Lenient-mode substitute; `None` keeps the original text.
    pub fallback: Option<Value>,
    /// Names that outrank both registry variables and form data.
    pub globals: Map<String, Value>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            strict: false,
            recursive: false,
            max_depth: DEFAULT_MAX_DEPTH,
            fallback: None,
            globals: Map::new(),
        }
    }
}

impl ResolveOptions {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: Value) -> Self {
        self.fallback = Some(fallback);
        self
    }

    #[must_use]
    pub fn with_global(mut self, name: impl Into<String>, value: Value) -> Self {
        self.globals.insert(name.into(), value);
        self
    }

    fn failure_mode(&self) -> FailureMode {
        match (&self.fallback, self.strict) {
            (_, true) => FailureMode::Strict,
            (Some(value), false) => FailureMode::Fallback(value.clone()),
            (None, false) => FailureMode::KeepOriginal,
        }
    }
}

/// Display properties of one field after resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedField {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
}

/// Resolves expressions embedded in form data and field configuration.
#[derive(Debug, Clone)]
pub struct TemplateResolver {
    expressions: Arc<ExpressionEngine>,
    registry: Arc<Registry>,
    conditions: ConditionEvaluator,
}

impl TemplateResolver {
    pub fn new(expressions: Arc<ExpressionEngine>, registry: Arc<Registry>) -> Self {
        let conditions = ConditionEvaluator::new(Arc::clone(&expressions));
        Self {
            expressions,
            registry,
            conditions,
        }
    }

    /// Use `conditions` for conditional defaults.
    #[must_use]
    pub fn with_conditions(mut self, conditions: ConditionEvaluator) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Build the evaluation context for one resolution.
    ///
    /// Lowest to highest: form data whose values are not themselves
    /// templates, the `field` entry describing `field`, registry variables,
    /// `options.globals`.
    pub fn context(
        &self,
        form_data: &Value,
        field: Option<&FieldSpec>,
        options: &ResolveOptions,
    ) -> EvaluationContext {
        let mut ctx = EvaluationContext::new(Arc::clone(&self.registry));
        if let Value::Object(values) = form_data {
            for (name, value) in values {
                if is_template(value) {
                    tracing::trace!(name, "template-valued entry left out of context");
                    continue;
                }
                ctx.insert_data(name.clone(), value.clone());
            }
        }
        if let Some(field) = field {
            ctx.insert_data("field", json!({"id": field.id, "type": field.kind.as_str()}));
        }
        for (name, value) in &options.globals {
            ctx.set_local(name.clone(), value.clone());
        }
        ctx
    }

    /// Resolve every expression inside `value` against `form_data`.
    pub fn resolve(
        &self,
        value: &Value,
        form_data: &Value,
        options: &ResolveOptions,
    ) -> EngineResult<Value> {
        let ctx = self.context(form_data, None, options);
        self.resolve_in(value, &ctx, options)
    }

    /// Resolve `value` against a prepared context.
    pub fn resolve_in(
        &self,
        value: &Value,
        ctx: &EvaluationContext,
        options: &ResolveOptions,
    ) -> EngineResult<Value> {
        let mut active = Vec::new();
        self.resolve_value(value, ctx, options, 0, &mut active)
    }

    /// Resolve a field's label, help, placeholder, default and properties.
    pub fn resolve_field(
        &self,
        field: &FieldSpec,
        form_data: &Value,
        options: &ResolveOptions,
    ) -> EngineResult<ResolvedField> {
        let ctx = self.context(form_data, Some(field), options);
        self.resolve_field_in(field, &ctx, options)
    }

    pub fn resolve_field_in(
        &self,
        field: &FieldSpec,
        ctx: &EvaluationContext,
        options: &ResolveOptions,
    ) -> EngineResult<ResolvedField> {
        let properties = match self.resolve_in(&Value::Object(field.properties.clone()), ctx, options)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Ok(ResolvedField {
            label: self.resolve_text(field.label.as_deref(), ctx, options)?,
            help: self.resolve_text(field.help.as_deref(), ctx, options)?,
            placeholder: self.resolve_text(field.placeholder.as_deref(), ctx, options)?,
            default: match &field.default {
                Some(default) => self.resolve_default(default, ctx, options)?,
                None => None,
            },
            properties,
        })
    }

    /// Pick and resolve a default.
    ///
    /// Conditional rules are tried in order and the first match wins; with
    /// no match the fallback applies. A failing condition is an error in
    /// strict mode and a non-match otherwise.
    pub fn resolve_default(
        &self,
        default: &DefaultValue,
        ctx: &EvaluationContext,
        options: &ResolveOptions,
    ) -> EngineResult<Option<Value>> {
        match default {
            DefaultValue::Static(value) => self.resolve_in(value, ctx, options).map(Some),
            DefaultValue::Conditional {
                conditional,
                fallback,
            } => {
                for (index, rule) in conditional.iter().enumerate() {
                    match self.conditions.evaluate(&rule.when, ctx) {
                        Ok(true) => {
                            tracing::trace!(index, "conditional default matched");
                            return self.resolve_in(&rule.value, ctx, options).map(Some);
                        }
                        Ok(false) => {}
                        Err(err) if options.strict => return Err(err),
                        Err(err) => {
                            tracing::warn!(index, error = %err, "conditional default rule failed; treating as no match");
                        }
                    }
                }
                fallback
                    .as_ref()
                    .map(|value| self.resolve_in(value, ctx, options))
                    .transpose()
            }
        }
    }

    /// Resolve an optional display string, rendering non-string results.
    pub fn resolve_text(
        &self,
        text: Option<&str>,
        ctx: &EvaluationContext,
        options: &ResolveOptions,
    ) -> EngineResult<Option<String>> {
        let Some(text) = text else {
            return Ok(None);
        };
        let value = self.resolve_in(&Value::String(text.to_string()), ctx, options)?;
        Ok(Some(to_display_string(&value)))
    }

    fn resolve_value(
        &self,
        value: &Value,
        ctx: &EvaluationContext,
        options: &ResolveOptions,
        depth: usize,
        active: &mut Vec<String>,
    ) -> EngineResult<Value> {
        if depth > options.max_depth {
            return Err(ExpressionError::depth_exceeded(options.max_depth).into());
        }
        match value {
            Value::String(text) => self.resolve_string(text, ctx, options, depth, active),
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve_value(item, ctx, options, depth + 1, active))
                .collect::<EngineResult<Vec<_>>>()
                .map(Value::Array),
            Value::Object(entries) => {
                let mut out = Map::with_capacity(entries.len());
                for (key, item) in entries {
                    out.insert(
                        key.clone(),
                        self.resolve_value(item, ctx, options, depth + 1, active)?,
                    );
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn resolve_string(
        &self,
        text: &str,
        ctx: &EvaluationContext,
        options: &ResolveOptions,
        depth: usize,
        active: &mut Vec<String>,
    ) -> EngineResult<Value> {
        if !ExpressionEngine::is_expression(text) {
            return Ok(Value::String(text.to_string()));
        }
        if active.iter().any(|key| key == text) {
            return Err(ExpressionError::reentrant(text).into());
        }

        active.push(text.to_string());
        let result = self.evaluate_string(text, ctx, options, depth, active);
        active.pop();
        result
    }

    fn evaluate_string(
        &self,
        text: &str,
        ctx: &EvaluationContext,
        options: &ResolveOptions,
        depth: usize,
        active: &mut Vec<String>,
    ) -> EngineResult<Value> {
        tracing::trace!(expression = text, depth, "resolving");
        let value = self
            .expressions
            .evaluate_with(text, ctx, &options.failure_mode())?;

        let unchanged = matches!(&value, Value::String(s) if s == text);
        if options.recursive && !unchanged && contains_template(&value) {
            return self.resolve_value(&value, ctx, options, depth + 1, active);
        }
        Ok(value)
    }
}

fn is_template(value: &Value) -> bool {
    matches!(value, Value::String(text) if ExpressionEngine::is_expression(text))
}

fn contains_template(value: &Value) -> bool {
    match value {
        Value::String(text) => ExpressionEngine::is_expression(text),
        Value::Array(items) => items.iter().any(contains_template),
        Value::Object(entries) => entries.values().any(contains_template),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formwork_expression::ErrorCategory;
    use formwork_schema::{Condition, FieldKind, Operator};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn resolver() -> TemplateResolver {
        let registry = Arc::new(Registry::with_builtins());
        registry.set_variable("currency", json!("NOK"));
        TemplateResolver::new(Arc::new(ExpressionEngine::new()), registry)
    }

    fn data() -> Value {
        json!({
            "user": {"name": "Ann", "age": 30},
            "currency": "EUR",
            "greeting": "Hi ${user.name}",
        })
    }

    #[rstest]
    #[case::native(json!("${user.age}"), json!(30))]
    #[case::mixed(json!("Hello ${user.name}!"), json!("Hello Ann!"))]
    #[case::plain(json!("no markers"), json!("no markers"))]
    #[case::nested(
        json!({"a": ["${user.name}", 1, null], "b": {"c": "${upper(user.name)}"}}),
        json!({"a": ["Ann", 1, null], "b": {"c": "ANN"}})
    )]
    #[case::registry_outranks_data(json!("${currency}"), json!("NOK"))]
    fn resolves_values(#[case] input: Value, #[case] expected: Value) {
        let out = resolver()
            .resolve(&input, &data(), &ResolveOptions::strict())
            .unwrap();
        assert_eq!(out, expected);
    }

    #[test]
    fn resolving_twice_changes_nothing() {
        let resolver = resolver();
        let input = json!({"x": "${user.name} is ${user.age}", "y": ["${missing}"]});
        let once = resolver.resolve(&input, &data(), &ResolveOptions::default()).unwrap();
        let twice = resolver.resolve(&once, &data(), &ResolveOptions::default()).unwrap();
        assert_eq!(once, json!({"x": "Ann is 30", "y": ["${missing}"]}));
        assert_eq!(once, twice);
    }

    #[test]
    fn template_entries_stay_out_of_context() {
        let err = resolver()
            .resolve(&json!("${greeting}"), &data(), &ResolveOptions::strict())
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Resolution);
    }

    #[test]
    fn lenient_mode_substitutes() {
        let resolver = resolver();
        let kept = resolver
            .resolve(&json!("${nope}"), &data(), &ResolveOptions::default())
            .unwrap();
        assert_eq!(kept, json!("${nope}"));

        let options = ResolveOptions::default().with_fallback(json!("n/a"));
        let replaced = resolver.resolve(&json!("${nope}"), &data(), &options).unwrap();
        assert_eq!(replaced, json!("n/a"));
    }

    #[test]
    fn globals_outrank_everything() {
        let options = ResolveOptions::strict().with_global("currency", json!("USD"));
        let out = resolver().resolve(&json!("${currency}"), &data(), &options).unwrap();
        assert_eq!(out, json!("USD"));
    }

    #[test]
    fn recursive_mode_follows_results() {
        let registry = Arc::new(Registry::with_builtins());
        registry.set_variable("link", json!("${user.name}"));
        registry.set_variable("ping", json!("${pong}"));
        registry.set_variable("pong", json!("${ping}"));
        let resolver = TemplateResolver::new(Arc::new(ExpressionEngine::new()), registry);

        let flat = resolver
            .resolve(&json!("${link}"), &data(), &ResolveOptions::strict())
            .unwrap();
        assert_eq!(flat, json!("${user.name}"));

        let options = ResolveOptions::strict().recursive(true);
        let deep = resolver.resolve(&json!("${link}"), &data(), &options).unwrap();
        assert_eq!(deep, json!("Ann"));

        let err = resolver
            .resolve(&json!("${ping}"), &data(), &options)
            .unwrap_err();
        assert_eq!(err.code(), "EXPR:REENTRANT");
    }

    #[test]
    fn depth_is_bounded() {
        let mut value = json!("leaf");
        for _ in 0..12 {
            value = json!([value]);
        }
        let err = resolver()
            .resolve(&value, &data(), &ResolveOptions::default())
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Limit);

        let shallow = ResolveOptions::default().with_max_depth(20);
        assert!(resolver().resolve(&value, &data(), &shallow).is_ok());
    }

    #[test]
    fn conditional_default_first_match_wins() {
        let field = FieldSpec::new("plan", FieldKind::Select).with_default(DefaultValue::conditional(
            [
                (Condition::simple("user.age", Operator::Lt, json!(18)), json!("junior")),
                (Condition::simple("user.age", Operator::Gte, json!(18)), json!("${user.name}-adult")),
                (Condition::exists("user"), json!("never")),
            ],
            Some(json!("basic")),
        ));
        let resolved = resolver()
            .resolve_field(&field, &data(), &ResolveOptions::strict())
            .unwrap();
        assert_eq!(resolved.default, Some(json!("Ann-adult")));

        let resolved = resolver()
            .resolve_field(&field, &json!({}), &ResolveOptions::strict())
            .unwrap();
        assert_eq!(resolved.default, Some(json!("basic")));
    }

    #[test]
    fn failing_default_rule_depends_on_mode() {
        let field = FieldSpec::text("t").with_default(DefaultValue::conditional(
            [(Condition::simple("user.name", Operator::Gt, json!(3)), json!("long"))],
            Some(json!("short")),
        ));
        let resolver = resolver();
        let lenient = resolver
            .resolve_field(&field, &data(), &ResolveOptions::default())
            .unwrap();
        assert_eq!(lenient.default, Some(json!("short")));

        let err = resolver
            .resolve_field(&field, &data(), &ResolveOptions::strict())
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Type);
    }

    #[test]
    fn field_configuration_resolves_with_field_context() {
        let field = FieldSpec::text("nickname")
            .with_label("Name for ${user.name}")
            .with_help("${field.id} (${field.type})")
            .with_placeholder("${user.age}")
            .with_property("hint", json!({"text": "${upper(user.name)}", "n": 1}));
        let resolved = resolver()
            .resolve_field(&field, &data(), &ResolveOptions::strict())
            .unwrap();
        assert_eq!(
            resolved,
            ResolvedField {
                label: Some("Name for Ann".into()),
                help: Some("nickname (text)".into()),
                placeholder: Some("30".into()),
                default: None,
                properties: json!({"hint": {"text": "ANN", "n": 1}})
                    .as_object()
                    .cloned()
                    .unwrap(),
            }
        );
    }
}
