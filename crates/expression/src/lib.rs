//! # formwork-expression
//!
//! The `${...}` expression language used by Formwork schemas.
//!
//! - A string that is exactly one fragment (`"${user.age}"`) evaluates to the
//!   fragment's native value.
//! - A string mixing text and fragments (`"Hello ${user.name}!"`) evaluates
//!   to a string with each fragment substituted.
//! - Fragment bodies are literals, array literals, dotted/indexed paths,
//!   function calls (`upper(user.name)`) or nested fragments.
//!
//! Names resolve against an [`EvaluationContext`]: local overrides first,
//! then [`Registry`] variables, then form data.
//!
//! ```
//! use std::sync::Arc;
//! use formwork_expression::{EvaluationContext, ExpressionEngine, Registry};
//! use serde_json::json;
//!
//! let engine = ExpressionEngine::new();
//! let ctx = EvaluationContext::builder(Arc::new(Registry::with_builtins()))
//!     .data(json!({"user": {"name": "Ann", "age": 30}}))
//!     .build();
//!
//! assert_eq!(engine.evaluate("${user.age}", &ctx).unwrap(), json!(30));
//! assert_eq!(engine.evaluate("Hi ${upper(user.name)}", &ctx).unwrap(), json!("Hi ANN"));
//! ```

pub mod builtins;
pub mod context;
pub mod core;
pub mod engine;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod registry;
pub mod suggest;
pub mod template;
pub mod value_utils;

pub use context::{EvaluationContext, EvaluationContextBuilder};
pub use engine::{ExpressionEngine, FailureMode};
pub use error::{ErrorCategory, ExpressionError, ExpressionResult};
pub use eval::Evaluator;
pub use registry::{FunctionEntry, FunctionInfo, NativeFunction, Registry, VariableInfo};
pub use suggest::{Suggestion, SuggestionKind, suggest};
pub use template::{Position, Template, TemplatePart};
