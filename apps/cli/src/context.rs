//! Per-invocation state shared by the command handlers.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use formwork_engine::FormEngine;
use formwork_expression::Registry;
use formwork_schema::FormSchema;
use serde_json::{Map, Value};

use crate::settings::Settings;

pub struct Session {
    pub settings: Settings,
    pub registry: Arc<Registry>,
}

impl Session {
    /// Builtins plus every `--var`.
    pub fn new(settings: Settings, vars: &[(String, Value)]) -> Self {
        let registry = Registry::with_builtins();
        for (name, value) in vars {
            registry.set_variable(name.clone(), value.clone());
        }
        Self {
            settings,
            registry: Arc::new(registry),
        }
    }

    /// Load and validate a schema, ready for evaluation.
    pub fn engine(&self, schema: &Path) -> Result<FormEngine> {
        let schema = load_schema(schema)?;
        let id = schema.id.clone();
        FormEngine::new(schema, Arc::clone(&self.registry), self.settings.engine.clone())
            .with_context(|| format!("cannot evaluate schema `{id}`"))
    }
}

pub fn load_schema(path: &Path) -> Result<FormSchema> {
    let raw = read(path)?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a valid schema", path.display()))
}

/// Form values, or an empty object when no file is given.
pub fn load_values(path: Option<&Path>) -> Result<Value> {
    let Some(path) = path else {
        return Ok(Value::Object(Map::new()));
    };
    let raw = read(path)?;
    let values: Value =
        serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))?;
    anyhow::ensure!(values.is_object(), "{} must contain a JSON object", path.display());
    Ok(values)
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
