//! Evaluation context for expression execution
//!
//! A context binds a shared [`Registry`] with two per-call layers. Name
//! lookup checks, highest first:
//!
//! 1. `locals`: explicit overrides for this evaluation
//! 2. registry variables
//! 3. `data`: the form values the expression runs against
//!
//! Dotted names are tried as flat keys first (`"user.age"`), then by
//! traversal from the shortest root.

use crate::registry::Registry;
use crate::value_utils::{PathSegment, get_path, parse_plain_path};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Evaluation context: registry plus per-call values
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    registry: Arc<Registry>,
    locals: Map<String, Value>,
    data: Map<String, Value>,
}

impl EvaluationContext {
    /// Create a context over a registry with no per-call values
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            locals: Map::new(),
            data: Map::new(),
        }
    }

    /// Create a builder for constructing contexts
    pub fn builder(registry: Arc<Registry>) -> EvaluationContextBuilder {
        EvaluationContextBuilder {
            context: Self::new(registry),
        }
    }

    /// The registry backing this context
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Set a local override
    pub fn set_local(&mut self, name: impl Into<String>, value: Value) {
        self.locals.insert(name.into(), value);
    }

    /// Get a local override
    pub fn local(&self, name: &str) -> Option<&Value> {
        self.locals.get(name)
    }

    /// Replace the data layer
    pub fn set_data(&mut self, data: Map<String, Value>) {
        self.data = data;
    }

    /// Insert a single data value
    pub fn insert_data(&mut self, name: impl Into<String>, value: Value) {
        self.data.insert(name.into(), value);
    }

    /// The data layer
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Look up a single (possibly dotted) name across all layers
    pub fn resolve_name(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.locals.get(name) {
            return Some(value.clone());
        }
        if let Some(value) = self.registry.variable(name) {
            return Some(value);
        }
        self.data.get(name).cloned()
    }

    /// Resolve a root identifier followed by leading keys.
    ///
    /// Tries the longest flat key first (`a.b.c`, then `a.b`, then `a`) and
    /// returns the value found together with how many keys it consumed.
    pub fn resolve_root(&self, root: &str, keys: &[&str]) -> Option<(Value, usize)> {
        for consumed in (0..=keys.len()).rev() {
            let value = if consumed == 0 {
                self.resolve_name(root)
            } else {
                let mut name = String::from(root);
                for key in &keys[..consumed] {
                    name.push('.');
                    name.push_str(key);
                }
                self.resolve_name(&name)
            };
            if let Some(value) = value {
                return Some((value, consumed));
            }
        }
        None
    }

    /// Resolve a plain path such as `user.tags[0]`.
    ///
    /// Returns `None` when the root is unknown or the path does not exist.
    pub fn lookup_path(&self, path: &str) -> Option<Value> {
        let segments = parse_plain_path(path)?;
        let (PathSegment::Key(root), rest) = segments.split_first()? else {
            return None;
        };
        let keys: Vec<&str> = rest
            .iter()
            .map_while(|s| match s {
                PathSegment::Key(k) => Some(k.as_str()),
                PathSegment::Index(_) => None,
            })
            .collect();
        let (value, consumed) = self.resolve_root(root, &keys)?;
        get_path(&value, &rest[consumed..]).cloned()
    }

    /// Names visible to expressions, highest layer first, without duplicates
    pub fn visible_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.locals.keys().cloned().collect();
        for name in self
            .registry
            .variable_names()
            .into_iter()
            .chain(self.data.keys().cloned())
        {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

/// Builder for creating evaluation contexts
#[derive(Debug, Clone)]
pub struct EvaluationContextBuilder {
    context: EvaluationContext,
}

impl EvaluationContextBuilder {
    /// Add a local override
    pub fn local(mut self, name: impl Into<String>, value: Value) -> Self {
        self.context.set_local(name, value);
        self
    }

    /// Add a data value
    pub fn data_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.context.insert_data(name, value);
        self
    }

    /// Use a JSON object as the data layer; non-objects are ignored
    pub fn data(mut self, data: Value) -> Self {
        if let Value::Object(map) = data {
            self.context.set_data(map);
        }
        self
    }

    /// Build the evaluation context
    pub fn build(self) -> EvaluationContext {
        self.context
    }
}
