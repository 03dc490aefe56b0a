//! Variable and function registry
//!
//! Named values and callables available to expressions. The registry is
//! shared behind an `Arc` and guarded by read-write locks: evaluation only
//! takes read locks, registration takes a short exclusive lock.

use crate::error::{ExpressionError, ExpressionResult};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Callable stored in the registry
pub type NativeFunction = Arc<dyn Fn(&[Value]) -> ExpressionResult<Value> + Send + Sync>;

/// Plain function pointer signature used by the builtins
pub type BuiltinFunction = fn(&[Value]) -> ExpressionResult<Value>;

/// A registered function plus its autosuggest metadata
#[derive(Clone)]
pub struct FunctionEntry {
    name: String,
    description: Option<String>,
    params: Vec<String>,
    func: NativeFunction,
}

impl FunctionEntry {
    /// Wrap a callable under `name`
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[Value]) -> ExpressionResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            params: Vec::new(),
            func: Arc::new(func),
        }
    }

    /// Attach a one-line description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach parameter names
    pub fn with_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = params.into_iter().map(Into::into).collect();
        self
    }

    /// Function name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Call signature such as `replace(text, from, to)`
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.params.join(", "))
    }
}

impl fmt::Debug for FunctionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionEntry")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("params", &self.params)
            .finish()
    }
}

#[derive(Debug, Clone)]
struct VariableEntry {
    value: Value,
    description: Option<String>,
}

/// Read-only view of a registered variable
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableInfo {
    pub name: String,
    pub description: Option<String>,
    pub value: Value,
}

/// Read-only view of a registered function
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionInfo {
    pub name: String,
    pub description: Option<String>,
    pub params: Vec<String>,
}

/// Store of named variables and functions usable by expressions
#[derive(Default)]
pub struct Registry {
    variables: RwLock<IndexMap<String, VariableEntry>>,
    functions: RwLock<IndexMap<String, FunctionEntry>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry preloaded with the builtin function library
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        crate::builtins::register_all(&registry);
        registry
    }

    /// Set (or replace) a variable
    pub fn set_variable(&self, name: impl Into<String>, value: Value) {
        self.variables.write().insert(
            name.into(),
            VariableEntry {
                value,
                description: None,
            },
        );
    }

    /// Set a variable with a description shown by autosuggest
    pub fn set_variable_described(
        &self,
        name: impl Into<String>,
        value: Value,
        description: impl Into<String>,
    ) {
        self.variables.write().insert(
            name.into(),
            VariableEntry {
                value,
                description: Some(description.into()),
            },
        );
    }

    /// Remove a variable, returning its value
    pub fn remove_variable(&self, name: &str) -> Option<Value> {
        self.variables.write().shift_remove(name).map(|e| e.value)
    }

    /// Clone the value of a variable
    pub fn variable(&self, name: &str) -> Option<Value> {
        self.variables.read().get(name).map(|e| e.value.clone())
    }

    /// Check whether a variable is registered
    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.read().contains_key(name)
    }

    /// Register a function entry, replacing any previous one with that name
    pub fn register(&self, entry: FunctionEntry) {
        tracing::debug!(function = %entry.name, "registering expression function");
        self.functions.write().insert(entry.name.clone(), entry);
    }

    /// Register a bare callable
    pub fn register_function<F>(&self, name: impl Into<String>, func: F)
    where
        F: Fn(&[Value]) -> ExpressionResult<Value> + Send + Sync + 'static,
    {
        self.register(FunctionEntry::new(name, func));
    }

    /// Register a builtin with description and parameter names
    pub(crate) fn register_builtin(
        &self,
        name: &str,
        description: &str,
        params: &[&str],
        func: BuiltinFunction,
    ) {
        self.register(
            FunctionEntry::new(name, func)
                .with_description(description)
                .with_params(params.iter().copied()),
        );
    }

    /// Check if a function exists
    pub fn has_function(&self, name: &str) -> bool {
        self.functions.read().contains_key(name)
    }

    /// Call a function by name.
    ///
    /// The callable is cloned out of the map first so it runs without the
    /// registry lock held.
    pub fn call(&self, name: &str, args: &[Value]) -> ExpressionResult<Value> {
        let func = self
            .functions
            .read()
            .get(name)
            .map(|e| Arc::clone(&e.func))
            .ok_or_else(|| ExpressionError::unknown_function(name))?;
        func(args)
    }

    /// Names of all variables, in registration order
    pub fn variable_names(&self) -> Vec<String> {
        self.variables.read().keys().cloned().collect()
    }

    /// Names of all functions, in registration order
    pub fn function_names(&self) -> Vec<String> {
        self.functions.read().keys().cloned().collect()
    }

    /// Snapshot of every variable
    pub fn variables(&self) -> Vec<VariableInfo> {
        self.variables
            .read()
            .iter()
            .map(|(name, e)| VariableInfo {
                name: name.clone(),
                description: e.description.clone(),
                value: e.value.clone(),
            })
            .collect()
    }

    /// Snapshot of every function
    pub fn functions(&self) -> Vec<FunctionInfo> {
        self.functions
            .read()
            .values()
            .map(|e| FunctionInfo {
                name: e.name.clone(),
                description: e.description.clone(),
                params: e.params.clone(),
            })
            .collect()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("variables", &self.variables.read().len())
            .field("functions", &self.functions.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_variables() {
        let registry = Registry::new();
        registry.set_variable("tenant", json!({"name": "acme"}));
        registry.set_variable_described("region", json!("eu"), "Deployment region");

        assert_eq!(registry.variable("tenant"), Some(json!({"name": "acme"})));
        assert!(registry.has_variable("region"));
        assert_eq!(registry.variable_names(), vec!["tenant", "region"]);
        assert_eq!(
            registry.variables()[1].description.as_deref(),
            Some("Deployment region")
        );

        assert_eq!(registry.remove_variable("tenant"), Some(json!({"name": "acme"})));
        assert!(!registry.has_variable("tenant"));
    }

    #[test]
    fn test_call_registered_function() {
        let registry = Registry::new();
        registry.register(
            FunctionEntry::new("double", |args: &[Value]| {
                let n = args.first().and_then(Value::as_i64).unwrap_or(0);
                Ok(json!(n * 2))
            })
            .with_description("Double a number")
            .with_params(["n"]),
        );

        assert_eq!(registry.call("double", &[json!(21)]).unwrap(), json!(42));
        assert_eq!(registry.functions()[0].params, vec!["n".to_string()]);
    }

    #[test]
    fn test_unknown_function() {
        let registry = Registry::new();
        let err = registry.call("missing", &[]).unwrap_err();
        assert_eq!(err, ExpressionError::unknown_function("missing"));
    }

    #[test]
    fn test_function_may_read_registry_while_called() {
        let registry = Arc::new(Registry::new());
        registry.set_variable("base", json!(10));
        let inner = Arc::clone(&registry);
        registry.register_function("plus_base", move |args: &[Value]| {
            let base = inner.variable("base").and_then(|v| v.as_i64()).unwrap_or(0);
            Ok(json!(base + args[0].as_i64().unwrap_or(0)))
        });
        assert_eq!(registry.call("plus_base", &[json!(5)]).unwrap(), json!(15));
    }

    #[test]
    fn test_builtins_loaded() {
        let registry = Registry::with_builtins();
        for name in ["upper", "sum", "first", "coalesce", "today"] {
            assert!(registry.has_function(name), "missing builtin {name}");
        }
    }
}
