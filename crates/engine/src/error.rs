//! Engine error types.

use formwork_expression::{ErrorCategory, ExpressionError};
use formwork_schema::SchemaError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors from the engine layer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// Error from expression parsing or evaluation.
    #[error(transparent)]
    Expression(#[from] ExpressionError),

    /// The schema failed structural validation.
    #[error("schema rejected: {0}")]
    Schema(#[from] SchemaError),

    /// Operator applied to values it cannot compare.
    #[error("type error in `{operator}`: expected {expected}, found {actual}")]
    Type {
        operator: String,
        expected: String,
        actual: String,
    },

    /// A condition that slipped past structural validation.
    #[error("ill-formed condition: {message}")]
    Structural { message: String },

    /// Fields that depend on each other in a loop.
    #[error("dependency cycle between {}", fields.join(" -> "))]
    Cycle { fields: Vec<String> },

    /// A dynamic function or options source failed.
    #[error("function `{name}` failed: {message}")]
    Function { name: String, message: String },

    /// A dynamic call named a transformer that was never registered.
    #[error("unknown transformer `{name}`")]
    UnknownTransformer { name: String },
}

impl EngineError {
    /// Broad error category shared with the other Formwork error types.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Expression(err) => err.category(),
            Self::Schema(err) => err.category(),
            Self::Type { .. } => ErrorCategory::Type,
            Self::Structural { .. } => ErrorCategory::Structural,
            Self::Cycle { .. } => ErrorCategory::Cycle,
            Self::Function { .. } => ErrorCategory::Function,
            Self::UnknownTransformer { .. } => ErrorCategory::Resolution,
        }
    }

    /// Machine-readable error code for programmatic handling.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Expression(err) => err.code(),
            Self::Schema(err) => err.code(),
            Self::Type { .. } => "ENGINE:TYPE",
            Self::Structural { .. } => "ENGINE:STRUCTURAL",
            Self::Cycle { .. } => "ENGINE:CYCLE",
            Self::Function { .. } => "ENGINE:FUNCTION",
            Self::UnknownTransformer { .. } => "ENGINE:UNKNOWN_TRANSFORMER",
        }
    }

    pub fn type_error(
        operator: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::Type {
            operator: operator.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn structural(message: impl Into<String>) -> Self {
        Self::Structural {
            message: message.into(),
        }
    }

    pub fn function(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Function {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn unknown_transformer(name: impl Into<String>) -> Self {
        Self::UnknownTransformer { name: name.into() }
    }
}
