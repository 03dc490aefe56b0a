//! # formwork-schema
//!
//! Declarative form definitions: fields, conditions, defaults, option
//! sources and validation rules, plus the structural checks that gate a
//! schema before it reaches the engine.
//!
//! Nested field ids flatten to paths (see [`path`]). Conditions and
//! expression-bearing strings are kept as data; nothing here evaluates them.

pub mod condition;
pub mod error;
pub mod field;
pub mod options;
pub mod path;
pub mod schema;
pub mod validation;

pub use condition::{Condition, Operator};
pub use error::{SchemaError, SchemaResult};
pub use field::{ConditionalDefault, DefaultValue, FieldKind, FieldSpec};
pub use options::{OptionsConfig, SelectOption};
pub use path::{FlatField, FlatFields};
pub use schema::FormSchema;
pub use validation::{ValidationRule, Violation};

pub mod prelude {
    pub use crate::condition::{Condition, Operator};
    pub use crate::error::SchemaError;
    pub use crate::field::{DefaultValue, FieldKind, FieldSpec};
    pub use crate::options::{OptionsConfig, SelectOption};
    pub use crate::schema::FormSchema;
    pub use crate::validation::ValidationRule;
}
