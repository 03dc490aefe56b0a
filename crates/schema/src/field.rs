use std::fmt;

use formwork_expression::ExpressionEngine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::condition::{Condition, collect_template_strings};
use crate::options::OptionsConfig;
use crate::validation::ValidationRule;

/// Closed set of field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    Text,
    Textarea,
    Number,
    Integer,
    Boolean,
    Select,
    Multiselect,
    Date,
    Datetime,
    Hidden,
    /// Fixed set of nested fields, flattened to `parent.child`.
    Group,
    /// Repeated item template, flattened to `parent[].child`.
    Array,
    /// Exactly one of the nested alternatives applies.
    OneOf,
    /// Any of the nested alternatives may apply.
    AnyOf,
}

impl FieldKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Textarea => "textarea",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Select => "select",
            Self::Multiselect => "multiselect",
            Self::Date => "date",
            Self::Datetime => "datetime",
            Self::Hidden => "hidden",
            Self::Group => "group",
            Self::Array => "array",
            Self::OneOf => "oneOf",
            Self::AnyOf => "anyOf",
        }
    }

    /// Kinds whose nested fields carry the values rather than the field itself.
    #[must_use]
    pub fn is_container(self) -> bool {
        matches!(self, Self::Group | Self::Array | Self::OneOf | Self::AnyOf)
    }

    #[must_use]
    pub fn has_options(self) -> bool {
        matches!(self, Self::Select | Self::Multiselect)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `when -> value` pair of a conditional default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalDefault {
    pub when: Condition,
    pub value: Value,
}

/// A field's default: a static value (possibly an expression) or an ordered
/// list of condition/value pairs where the first match wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Conditional {
        conditional: Vec<ConditionalDefault>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<Value>,
    },
    Static(Value),
}

impl DefaultValue {
    pub fn conditional(
        rules: impl IntoIterator<Item = (Condition, Value)>,
        fallback: Option<Value>,
    ) -> Self {
        Self::Conditional {
            conditional: rules
                .into_iter()
                .map(|(when, value)| ConditionalDefault { when, value })
                .collect(),
            fallback,
        }
    }

    /// Conditions of a conditional default, in declaration order.
    pub fn conditions(&self) -> impl Iterator<Item = &Condition> {
        let rules: &[ConditionalDefault] = match self {
            Self::Conditional { conditional, .. } => conditional,
            Self::Static(_) => &[],
        };
        rules.iter().map(|rule| &rule.when)
    }

    /// Fragment-bearing strings among the candidate values.
    #[must_use]
    pub fn expressions(&self) -> Vec<&str> {
        let mut out = Vec::new();
        match self {
            Self::Static(value) => collect_template_strings(value, &mut out),
            Self::Conditional {
                conditional,
                fallback,
            } => {
                for rule in conditional {
                    collect_template_strings(&rule.value, &mut out);
                }
                if let Some(value) = fallback {
                    collect_template_strings(value, &mut out);
                }
            }
        }
        out
    }
}

impl From<Value> for DefaultValue {
    fn from(value: Value) -> Self {
        Self::Static(value)
    }
}

/// Declarative description of one form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: FieldKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none", alias = "visible_if")]
    pub visible_when: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "enabled_if")]
    pub enabled_when: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "required_if")]
    pub required_when: Option<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation: Vec<ValidationRule>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<OptionsConfig>,

    /// Free-form configuration; may embed expressions.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,

    /// Nested fields of group, array, oneOf and anyOf kinds.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldSpec>,
}

impl FieldSpec {
    pub fn new(id: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            id: id.into(),
            kind,
            label: None,
            help: None,
            placeholder: None,
            required: false,
            visible_when: None,
            enabled_when: None,
            required_when: None,
            default: None,
            validation: Vec::new(),
            options: None,
            properties: Map::new(),
            fields: Vec::new(),
        }
    }

    pub fn text(id: impl Into<String>) -> Self {
        Self::new(id, FieldKind::Text)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn visible_when(mut self, condition: Condition) -> Self {
        self.visible_when = Some(condition);
        self
    }

    pub fn enabled_when(mut self, condition: Condition) -> Self {
        self.enabled_when = Some(condition);
        self
    }

    pub fn required_when(mut self, condition: Condition) -> Self {
        self.required_when = Some(condition);
        self
    }

    pub fn with_default(mut self, default: impl Into<DefaultValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_rule(mut self, rule: ValidationRule) -> Self {
        self.validation.push(rule);
        self
    }

    pub fn with_options(mut self, options: OptionsConfig) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Every condition attached to this field with the slot it lives in.
    pub fn conditions(&self) -> Vec<(String, &Condition)> {
        let mut out: Vec<(String, &Condition)> = [
            ("visible_when", &self.visible_when),
            ("enabled_when", &self.enabled_when),
            ("required_when", &self.required_when),
        ]
        .into_iter()
        .filter_map(|(slot, condition)| condition.as_ref().map(|c| (slot.to_string(), c)))
        .collect();
        if let Some(default) = &self.default {
            out.extend(
                default
                    .conditions()
                    .enumerate()
                    .map(|(i, c)| (format!("default.conditional[{i}].when"), c)),
            );
        }
        out
    }

    /// Field names this field reads directly through conditions and options.
    #[must_use]
    pub fn field_references(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .conditions()
            .into_iter()
            .flat_map(|(_, condition)| condition.field_references())
            .collect();
        if let Some(options) = &self.options {
            out.extend(options.field_references());
        }
        out
    }

    /// Every expression template embedded in this field's own configuration
    /// (nested fields excluded).
    #[must_use]
    pub fn expressions(&self) -> Vec<String> {
        let mut out: Vec<String> = [&self.label, &self.help, &self.placeholder]
            .into_iter()
            .flatten()
            .filter(|text| ExpressionEngine::is_expression(text))
            .cloned()
            .collect();

        for (_, condition) in self.conditions() {
            out.extend(condition.expressions());
        }
        if let Some(default) = &self.default {
            out.extend(default.expressions().into_iter().map(str::to_string));
        }
        for rule in &self.validation {
            if let ValidationRule::Custom { expression, .. } = rule {
                out.push(crate::condition::as_template(expression));
            }
        }
        if let Some(options) = &self.options {
            out.extend(options.expressions().into_iter().map(str::to_string));
        }
        let mut property_templates = Vec::new();
        for value in self.properties.values() {
            collect_template_strings(value, &mut property_templates);
        }
        out.extend(property_templates.into_iter().map(str::to_string));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn deserialize_field() {
        let field: FieldSpec = serde_json::from_value(json!({
            "id": "city",
            "type": "select",
            "label": "City in ${country}",
            "required": true,
            "visible_if": {"type": "exists", "field": "country"},
            "default": {
                "conditional": [
                    {"when": {"type": "simple", "field": "country", "value": "NO"}, "value": "osl"}
                ],
                "fallback": null
            },
            "options": {"source": "dependent", "depends_on": "country", "options": {}},
            "properties": {"hint": "${region}"}
        }))
        .unwrap();

        assert_eq!(field.kind, FieldKind::Select);
        assert!(field.visible_when.is_some());
        assert!(matches!(field.default, Some(DefaultValue::Conditional { .. })));
        assert_eq!(field.field_references(), vec!["country", "country", "country"]);
        assert_eq!(field.expressions(), vec!["City in ${country}", "${region}"]);
    }

    #[test]
    fn static_default_is_untagged() {
        let field: FieldSpec =
            serde_json::from_value(json!({"id": "n", "type": "number", "default": 5})).unwrap();
        assert_eq!(field.default, Some(DefaultValue::Static(json!(5))));

        let field: FieldSpec = serde_json::from_value(
            json!({"id": "o", "type": "hidden", "default": {"currency": "EUR"}}),
        )
        .unwrap();
        assert_eq!(field.default, Some(DefaultValue::Static(json!({"currency": "EUR"}))));
    }

    #[test]
    fn kinds_serialize_camel_case() {
        assert_eq!(serde_json::to_value(FieldKind::OneOf).unwrap(), json!("oneOf"));
        assert_eq!(serde_json::to_value(FieldKind::Multiselect).unwrap(), json!("multiselect"));
        assert!(FieldKind::AnyOf.is_container());
        assert!(!FieldKind::Select.is_container());
    }

    #[test]
    fn conditions_are_labelled_by_slot() {
        let field = FieldSpec::text("x")
            .required_when(Condition::exists("y"))
            .with_default(DefaultValue::conditional(
                [(Condition::eq("z", json!(1)), json!("one"))],
                None,
            ))
            .with_rule(ValidationRule::custom("includes(allowed, value)"));
        let slots: Vec<String> = field.conditions().into_iter().map(|(s, _)| s).collect();
        assert_eq!(slots, vec!["required_when", "default.conditional[0].when"]);
        assert_eq!(field.expressions(), vec!["${includes(allowed, value)}"]);
    }
}
