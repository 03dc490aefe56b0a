//! Whole-form evaluation pass.
//!
//! [`FormEngine`] binds a validated schema to a registry and walks fields in
//! dependency order, computing visibility, enablement, requirement,
//! effective values, display strings, options and rule violations. A field's
//! resolved value is written back before later fields read it. Failures are
//! recorded on the field and never abort the pass.

use std::collections::HashMap;
use std::sync::Arc;

use formwork_expression::value_utils::{is_empty, is_truthy, to_display_string};
use formwork_expression::{EvaluationContext, ExpressionEngine, Registry};
use formwork_schema::condition::as_template;
use formwork_schema::{
    Condition, FieldKind, FieldSpec, FormSchema, OptionsConfig, SelectOption, ValidationRule,
    Violation,
};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::condition::ConditionEvaluator;
use crate::config::EngineConfig;
use crate::dynamic::{DynamicCall, DynamicFunctionService, to_options};
use crate::error::{EngineError, EngineResult};
use crate::graph::DependencyGraph;
use crate::resolver::{ResolveOptions, TemplateResolver};

/// A failure scoped to one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub code: &'static str,
    pub message: String,
}

impl From<&EngineError> for FieldError {
    fn from(err: &EngineError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Computed state of one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldState {
    /// Flattened path.
    pub id: String,
    pub kind: FieldKind,
    pub visible: bool,
    pub enabled: bool,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<SelectOption>>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

/// Result of an evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormState {
    /// Evaluated fields in evaluation order.
    pub fields: IndexMap<String, FieldState>,
    /// Form values with defaults and resolved templates applied.
    pub values: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cycles: Vec<Vec<String>>,
}

impl FormState {
    #[must_use]
    pub fn field(&self, id: &str) -> Option<&FieldState> {
        self.fields.get(id)
    }

    /// No evaluated field has a rule violation.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.fields.values().all(|field| field.violations.is_empty())
    }

    /// Some evaluated field recorded an evaluation failure.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.fields.values().any(|field| !field.errors.is_empty())
    }
}

/// A schema bound to a registry, ready for evaluation.
#[derive(Debug)]
pub struct FormEngine {
    schema: FormSchema,
    config: EngineConfig,
    registry: Arc<Registry>,
    expressions: Arc<ExpressionEngine>,
    conditions: ConditionEvaluator,
    resolver: TemplateResolver,
    dynamic: DynamicFunctionService,
    graph: DependencyGraph,
}

impl FormEngine {
    /// Validate `schema` and build its dependency graph.
    ///
    /// Structural problems reject the schema. Dependency cycles do not; they
    /// are logged and reported on every [`FormState`].
    pub fn new(schema: FormSchema, registry: Arc<Registry>, config: EngineConfig) -> EngineResult<Self> {
        schema.validate()?;

        let expressions = Arc::new(ExpressionEngine::with_cache_size(config.parse_cache_capacity));
        let conditions = ConditionEvaluator::new(Arc::clone(&expressions))
            .with_case_insensitive(config.case_insensitive_strings);
        let resolver = TemplateResolver::new(Arc::clone(&expressions), Arc::clone(&registry))
            .with_conditions(conditions.clone());
        let dynamic = DynamicFunctionService::from_config(
            Arc::clone(&registry),
            Arc::clone(&expressions),
            &config,
        );
        let graph = DependencyGraph::build(&schema, &expressions);

        if graph.has_cycles() {
            for fields in graph.cycles() {
                let err = EngineError::Cycle {
                    fields: fields.clone(),
                };
                tracing::warn!(schema = %schema.id, error = %err, "schema accepted with a dependency cycle");
            }
        }
        tracing::debug!(schema = %schema.id, fields = graph.field_ids().len(), "form engine ready");

        Ok(Self {
            schema,
            config,
            registry,
            expressions,
            conditions,
            resolver,
            dynamic,
            graph,
        })
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn conditions(&self) -> &ConditionEvaluator {
        &self.conditions
    }

    pub fn resolver(&self) -> &TemplateResolver {
        &self.resolver
    }

    pub fn dynamic(&self) -> &DynamicFunctionService {
        &self.dynamic
    }

    /// Evaluate every field.
    pub fn evaluate(&self, values: &Value) -> FormState {
        self.run(None, values)
    }

    /// Re-evaluate after a change to `changed`, reporting only the affected
    /// fields. Every field still writes its effective value.
    pub fn on_change<I, S>(&self, changed: I, values: &Value) -> FormState
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let affected = self.graph.affected_fields(changed);
        tracing::debug!(affected = affected.len(), "propagating change");
        self.run(Some(&affected), values)
    }

    fn run(&self, emit: Option<&IndexSet<String>>, values: &Value) -> FormState {
        let working = match values {
            Value::Object(_) => values.clone(),
            _ => Value::Object(Map::new()),
        };
        let flat = self.schema.flatten();
        let mut pass = Pass {
            engine: self,
            specs: flat
                .iter()
                .map(|entry| (entry.path, (entry.parent, entry.field)))
                .collect(),
            options: self.config.resolve_options(),
            working,
            flags: HashMap::new(),
        };

        let order = self.graph.evaluation_order();
        let mut fields = IndexMap::with_capacity(emit.map_or(order.len(), IndexSet::len));
        for path in order {
            let Some(&(_, field)) = pass.specs.get(path.as_str()) else {
                continue;
            };
            let state = pass.field_state(&path, field);
            if emit.is_none_or(|affected| affected.contains(&path)) {
                fields.insert(path, state);
            }
        }
        tracing::debug!(schema = %self.schema.id, fields = fields.len(), "form evaluated");

        FormState {
            fields,
            values: pass.working,
            cycles: self.graph.cycles().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Flags {
    visible: bool,
    enabled: bool,
}

/// Mutable state of one evaluation pass.
struct Pass<'e> {
    engine: &'e FormEngine,
    /// Field path to parent path and spec.
    specs: HashMap<&'e str, (Option<&'e str>, &'e FieldSpec)>,
    options: ResolveOptions,
    working: Value,
    /// Combined flags and the condition errors raised computing them.
    flags: HashMap<String, (Flags, Vec<FieldError>)>,
}

impl Pass<'_> {
    fn field_state(&mut self, path: &str, field: &FieldSpec) -> FieldState {
        let (flags, mut errors) = self.flags(path, field);
        let ctx = self.context(field);

        let required_when = field
            .required_when
            .as_ref()
            .is_some_and(|c| self.condition(c, &ctx, false, &mut errors));
        let required = field.required || required_when;

        let default = match &field.default {
            Some(default) => self
                .engine
                .resolver
                .resolve_default(default, &ctx, &self.options)
                .unwrap_or_else(|err| record(&mut errors, &err, None)),
            None => None,
        };

        let item_template = path.contains("[]");
        let value = if item_template {
            None
        } else {
            self.effective_value(path, default.as_ref(), &ctx, &mut errors)
        };

        // Re-read the context so display strings see this field's own value.
        let ctx = self.context(field);
        let text = |text: &Option<String>, errors: &mut Vec<FieldError>| {
            self.engine
                .resolver
                .resolve_text(text.as_deref(), &ctx, &self.options)
                .unwrap_or_else(|err| record(errors, &err, text.clone()))
        };
        let label = text(&field.label, &mut errors);
        let help = text(&field.help, &mut errors);
        let placeholder = text(&field.placeholder, &mut errors);

        let properties = match self.engine.resolver.resolve_in(
            &Value::Object(field.properties.clone()),
            &ctx,
            &self.options,
        ) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(err) => record(&mut errors, &err, field.properties.clone()),
        };

        let options = match &field.options {
            Some(config) if flags.visible => self.options_for(config, &ctx, &mut errors),
            _ => None,
        };

        let violations = if flags.visible && flags.enabled && !item_template {
            self.violations(field, required, value.as_ref(), &ctx, &mut errors)
        } else {
            Vec::new()
        };

        FieldState {
            id: path.to_string(),
            kind: field.kind,
            visible: flags.visible,
            enabled: flags.enabled,
            required,
            value,
            default,
            label,
            help,
            placeholder,
            options,
            properties,
            violations,
            errors,
        }
    }

    fn context(&self, field: &FieldSpec) -> EvaluationContext {
        self.engine
            .resolver
            .context(&self.working, Some(field), &self.options)
    }

    /// Own visibility and enablement combined with every ancestor's.
    ///
    /// Memoized per path together with the field's own condition errors.
    fn flags(&mut self, path: &str, field: &FieldSpec) -> (Flags, Vec<FieldError>) {
        if let Some((flags, errors)) = self.flags.get(path) {
            return (*flags, errors.clone());
        }

        let parent = self.specs.get(path).and_then(|&(parent, _)| parent);
        let inherited = match parent.and_then(|p| self.specs.get(p).map(|&(_, spec)| (p, spec))) {
            Some((parent_path, parent_field)) => self.flags(parent_path, parent_field).0,
            None => Flags {
                visible: true,
                enabled: true,
            },
        };

        let mut errors = Vec::new();
        let ctx = self.context(field);
        let visible = field
            .visible_when
            .as_ref()
            .is_none_or(|c| self.condition(c, &ctx, true, &mut errors));
        let enabled = field
            .enabled_when
            .as_ref()
            .is_none_or(|c| self.condition(c, &ctx, true, &mut errors));

        let flags = Flags {
            visible: inherited.visible && visible,
            enabled: inherited.enabled && enabled,
        };
        self.flags.insert(path.to_string(), (flags, errors.clone()));
        (flags, errors)
    }

    fn condition(
        &self,
        condition: &Condition,
        ctx: &EvaluationContext,
        default: bool,
        errors: &mut Vec<FieldError>,
    ) -> bool {
        self.engine
            .conditions
            .evaluate(condition, ctx)
            .unwrap_or_else(|err| record(errors, &err, default))
    }

    /// The submitted value with templates resolved, or the default when the
    /// submitted value is empty. Written back into the working values.
    fn effective_value(
        &mut self,
        path: &str,
        default: Option<&Value>,
        ctx: &EvaluationContext,
        errors: &mut Vec<FieldError>,
    ) -> Option<Value> {
        let current = read(&self.working, path).cloned();
        let effective = match &current {
            Some(value) if !is_empty(value) => Some(
                self.engine
                    .resolver
                    .resolve_in(value, ctx, &self.options)
                    .unwrap_or_else(|err| record(errors, &err, value.clone())),
            ),
            _ => default.cloned().or_else(|| current.clone()),
        };
        if let Some(value) = &effective
            && current.as_ref() != Some(value)
        {
            write(&mut self.working, path, value.clone());
        }
        effective
    }

    fn options_for(
        &self,
        config: &OptionsConfig,
        ctx: &EvaluationContext,
        errors: &mut Vec<FieldError>,
    ) -> Option<Vec<SelectOption>> {
        match config {
            OptionsConfig::Static { options } => Some(options.clone()),
            OptionsConfig::Dependent {
                depends_on,
                options,
            } => {
                let key = ctx
                    .lookup_path(depends_on)
                    .map(|v| to_display_string(&v))
                    .unwrap_or_default();
                Some(options.get(&key).cloned().unwrap_or_default())
            }
            OptionsConfig::Dynamic {
                function: Some(function),
                args,
                transform,
                ..
            } => {
                let call = DynamicCall {
                    function: function.clone(),
                    args: args.clone(),
                    transform: transform.clone(),
                };
                match self.engine.dynamic.execute(&call, &self.working) {
                    Ok(result) => Some(to_options(&result)),
                    Err(err) => record(errors, &err, None),
                }
            }
            OptionsConfig::Dynamic {
                endpoint: Some(endpoint),
                ..
            } => {
                let err = EngineError::function(
                    endpoint.as_str(),
                    "endpoint sources are not fetched by the engine",
                );
                record(errors, &err, None)
            }
            OptionsConfig::Dynamic { .. } => None,
        }
    }

    fn violations(
        &self,
        field: &FieldSpec,
        required: bool,
        value: Option<&Value>,
        ctx: &EvaluationContext,
        errors: &mut Vec<FieldError>,
    ) -> Vec<Violation> {
        let value = value.filter(|v| !is_empty(v));
        let Some(value) = value else {
            return if required {
                vec![Violation {
                    rule: "required",
                    message: "is required".to_string(),
                }]
            } else {
                Vec::new()
            };
        };

        let mut out = Vec::new();
        for rule in &field.validation {
            let violation = match rule {
                ValidationRule::Custom { expression, .. } => {
                    let mut local = ctx.clone();
                    local.set_local("value", value.clone());
                    match self.engine.expressions.evaluate(&as_template(expression), &local) {
                        Ok(result) if is_truthy(&result) => None,
                        Ok(_) => Some(rule.violation()),
                        Err(err) => record(errors, &EngineError::from(err), None),
                    }
                }
                _ => rule.check(value),
            };
            out.extend(violation);
        }
        out
    }
}

/// Log `err`, push it onto `errors` and answer `fallback`.
fn record<T>(errors: &mut Vec<FieldError>, err: &EngineError, fallback: T) -> T {
    tracing::warn!(code = err.code(), error = %err, "field evaluation degraded");
    errors.push(FieldError::from(err));
    fallback
}

/// Value at a dotted path, trying the flat key first.
fn read<'a>(values: &'a Value, path: &str) -> Option<&'a Value> {
    values
        .get(path)
        .or_else(|| path.split('.').try_fold(values, |current, key| current.get(key)))
}

fn write(values: &mut Value, path: &str, value: Value) {
    if let Value::Object(map) = values
        && map.contains_key(path)
    {
        map.insert(path.to_string(), value);
        return;
    }

    let mut current = values;
    let mut keys = path.split('.').peekable();
    while let Some(key) = keys.next() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        if keys.peek().is_none() {
            map.insert(key.to_string(), value);
            return;
        }
        current = map
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formwork_schema::Operator;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn write_creates_intermediate_objects() {
        let mut values = json!({"a": 1, "flat.key": 2});
        write(&mut values, "b.c.d", json!(3));
        write(&mut values, "flat.key", json!(4));
        assert_eq!(values, json!({"a": 1, "flat.key": 4, "b": {"c": {"d": 3}}}));
        assert_eq!(read(&values, "b.c.d"), Some(&json!(3)));
        assert_eq!(read(&values, "b.x"), None);
    }

    #[test]
    fn hidden_parents_hide_children() {
        let schema = FormSchema::new("nested")
            .with_field(FieldSpec::new("toggle", FieldKind::Boolean))
            .with_field(
                FieldSpec::new("extra", FieldKind::Group)
                    .visible_when(Condition::eq("toggle", json!(true)))
                    .with_field(FieldSpec::text("note").required()),
            );
        let engine = FormEngine::new(schema, Arc::new(Registry::with_builtins()), EngineConfig::default())
            .unwrap();

        let state = engine.evaluate(&json!({"toggle": false}));
        let note = state.field("extra.note").unwrap();
        assert!(!note.visible);
        assert!(note.violations.is_empty());
        assert!(state.is_valid());

        let state = engine.evaluate(&json!({"toggle": true}));
        let note = state.field("extra.note").unwrap();
        assert!(note.visible);
        assert_eq!(note.violations[0].rule, "required");
    }

    #[test]
    fn failures_stay_on_their_field() {
        let schema = FormSchema::new("f")
            .with_field(FieldSpec::new("age", FieldKind::Number))
            .with_field(
                FieldSpec::text("badge")
                    .visible_when(Condition::simple("age", Operator::Gt, json!("soon")))
                    .with_label("${missing_fn(age)}"),
            )
            .with_field(FieldSpec::text("fine").with_label("Age ${age}"));
        let engine =
            FormEngine::new(schema, Arc::new(Registry::with_builtins()), EngineConfig::strict()).unwrap();

        let state = engine.evaluate(&json!({"age": 3}));
        let badge = state.field("badge").unwrap();
        let codes: Vec<&str> = badge.errors.iter().map(|e| e.code).collect();
        assert_eq!(codes, vec!["ENGINE:TYPE", "EXPR:FUNC_NOT_FOUND"]);
        assert!(badge.visible);
        assert_eq!(badge.label.as_deref(), Some("${missing_fn(age)}"));
        assert_eq!(state.field("fine").unwrap().label.as_deref(), Some("Age 3"));
        assert!(state.has_errors());
    }

    fn engine(schema: FormSchema) -> FormEngine {
        FormEngine::new(schema, Arc::new(Registry::with_builtins()), EngineConfig::default()).unwrap()
    }

    #[test]
    fn parent_condition_errors_survive_early_evaluation() {
        let schema = FormSchema::new("nested").with_field(
            FieldSpec::new("extra", FieldKind::Group)
                .visible_when(Condition::simple("extra.note", Operator::Gt, json!("soon")))
                .with_field(FieldSpec::new("note", FieldKind::Number)),
        );
        let engine = engine(schema);
        assert_eq!(engine.graph().evaluation_order(), vec!["extra.note", "extra"]);

        let state = engine.evaluate(&json!({"extra": {"note": 3}}));
        let codes: Vec<&str> = state.field("extra").unwrap().errors.iter().map(|e| e.code).collect();
        assert_eq!(codes, vec!["ENGINE:TYPE"]);
        assert!(state.field("extra.note").unwrap().errors.is_empty());
    }

    #[test]
    fn change_reaches_children_of_hidden_parent() {
        let schema = FormSchema::new("nested")
            .with_field(FieldSpec::new("toggle", FieldKind::Boolean))
            .with_field(
                FieldSpec::new("extra", FieldKind::Group)
                    .visible_when(Condition::eq("toggle", json!(true)))
                    .with_field(FieldSpec::text("note").required()),
            );
        let engine = engine(schema);
        let values = json!({"toggle": false});

        let changed = engine.on_change(["toggle"], &values);
        let ids: Vec<&str> = changed.fields.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["toggle", "extra", "extra.note"]);

        let full = engine.evaluate(&values);
        assert_eq!(changed.field("extra.note"), full.field("extra.note"));
        assert!(!changed.field("extra.note").unwrap().visible);
    }

    #[test]
    fn change_sees_unaffected_defaults() {
        let schema = FormSchema::new("labels")
            .with_field(FieldSpec::text("x"))
            .with_field(FieldSpec::text("z").with_default(json!("zed")))
            .with_field(FieldSpec::text("y").with_label("${x}-${z}"));
        let engine = engine(schema);
        let values = json!({"x": "a"});

        let changed = engine.on_change(["x"], &values);
        let ids: Vec<&str> = changed.fields.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["x", "y"]);
        assert_eq!(changed.field("y").unwrap().label.as_deref(), Some("a-zed"));
        assert_eq!(changed.field("y"), engine.evaluate(&values).field("y"));
        assert_eq!(changed.values["z"], json!("zed"));
    }
}
