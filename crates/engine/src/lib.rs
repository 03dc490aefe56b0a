//! # formwork-engine
//!
//! Reactive evaluation of Formwork schemas.
//!
//! - [`ConditionEvaluator`] decides visibility, enablement and requirement.
//! - [`DependencyGraph`] records which fields read which, for propagation
//!   and evaluation order.
//! - [`TemplateResolver`] resolves `${...}` fragments inside nested values,
//!   field configuration and conditional defaults.
//! - [`DynamicFunctionService`] runs registered functions for dynamic
//!   options, with a TTL cache and search/filter/sort/paginate.
//! - [`FormEngine`] ties them into one pass over a form.
//!
//! ```
//! use std::sync::Arc;
//! use formwork_engine::{EngineConfig, FormEngine};
//! use formwork_expression::Registry;
//! use formwork_schema::{Condition, FieldSpec, FormSchema};
//! use serde_json::json;
//!
//! let schema = FormSchema::new("signup")
//!     .with_field(FieldSpec::text("role"))
//!     .with_field(FieldSpec::text("team").visible_when(Condition::eq("role", json!("admin"))));
//! let engine = FormEngine::new(schema, Arc::new(Registry::with_builtins()), EngineConfig::default())
//!     .unwrap();
//!
//! let state = engine.evaluate(&json!({"role": "user"}));
//! assert!(!state.field("team").unwrap().visible);
//! assert_eq!(engine.graph().affected_fields(["role"]).len(), 2);
//! ```

pub mod condition;
pub mod config;
pub mod dynamic;
pub mod error;
pub mod form;
pub mod graph;
pub mod resolver;

pub use condition::ConditionEvaluator;
pub use config::EngineConfig;
pub use dynamic::{
    CacheStats, DynamicCall, DynamicFunctionService, Filter, OptionsQuery, Page, Sort, SortBy,
    SortDirection,
};
pub use error::{EngineError, EngineResult};
pub use form::{FieldError, FieldState, FormEngine, FormState};
pub use graph::DependencyGraph;
pub use resolver::{ResolveOptions, ResolvedField, TemplateResolver};
