use std::collections::HashSet;

use formwork_expression::ExpressionEngine;
use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, SchemaResult};
use crate::field::FieldSpec;
use crate::path::{FlatFields, ROOT};
use crate::validation::ValidationRule;

/// A complete form definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSchema {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

impl FormSchema {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            description: None,
            fields: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Every field with its flattened path, parents first.
    pub fn flatten(&self) -> FlatFields<'_> {
        FlatFields::new(&self.fields)
    }

    /// Find a field by flattened path (`address.city`, `items[0].name`).
    pub fn field(&self, path: &str) -> Option<&FieldSpec> {
        self.flatten().field(path)
    }

    /// First structural problem, if any.
    pub fn validate(&self) -> SchemaResult<()> {
        match self.problems().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Every structural problem in declaration order.
    pub fn problems(&self) -> Vec<SchemaError> {
        let engine = ExpressionEngine::without_cache();
        let mut problems = Vec::new();
        check_siblings(&self.fields, ROOT, &mut problems);

        for flat in self.flatten().iter() {
            check_field(flat.path, flat.field, &engine, &mut problems);
        }

        tracing::debug!(
            schema = %self.id,
            problems = problems.len(),
            "schema structure checked"
        );
        problems
    }
}

fn check_siblings(fields: &[FieldSpec], parent: &str, problems: &mut Vec<SchemaError>) {
    let mut seen = HashSet::new();
    for field in fields {
        if let Err(err) = check_id(&field.id) {
            problems.push(err);
        } else if !seen.insert(field.id.as_str()) {
            problems.push(SchemaError::duplicate_id(&field.id, parent));
        }
        let parent = if parent == ROOT {
            field.id.clone()
        } else {
            format!("{parent}.{}", field.id)
        };
        check_siblings(&field.fields, &parent, problems);
    }
}

fn check_id(id: &str) -> SchemaResult<()> {
    let mut chars = id.chars();
    let Some(first) = chars.next() else {
        return Err(SchemaError::invalid_id(id, "id must not be empty"));
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(SchemaError::invalid_id(
            id,
            "id must start with a letter or underscore",
        ));
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))) {
        return Err(SchemaError::invalid_id(
            id,
            format!("character `{bad}` is not allowed"),
        ));
    }
    Ok(())
}

fn check_field(
    path: &str,
    field: &FieldSpec,
    engine: &ExpressionEngine,
    problems: &mut Vec<SchemaError>,
) {
    if !field.kind.is_container() && !field.fields.is_empty() {
        problems.push(SchemaError::structural(
            path,
            format!("`{}` fields cannot have nested fields", field.kind),
        ));
    }

    for (slot, condition) in field.conditions() {
        if let Err(err) = condition.validate_with(&format!("{path}.{slot}"), engine) {
            problems.push(err);
        }
    }

    if let Some(options) = &field.options
        && let Err(err) = options.validate(&format!("{path}.options"))
    {
        problems.push(err);
    }

    for (i, rule) in field.validation.iter().enumerate() {
        if let ValidationRule::Pattern { pattern, .. } = rule
            && let Err(e) = regex::Regex::new(pattern)
        {
            problems.push(SchemaError::structural(
                format!("{path}.validation[{i}]"),
                format!("invalid pattern `{pattern}`: {e}"),
            ));
        }
    }

    let in_conditions: HashSet<String> = field
        .conditions()
        .into_iter()
        .flat_map(|(_, condition)| condition.expressions())
        .collect();
    for text in field.expressions() {
        if in_conditions.contains(&text) {
            continue;
        }
        if let Err(e) = engine.check_syntax(&text) {
            problems.push(SchemaError::structural(path, e.to_string()));
        }
    }
}
