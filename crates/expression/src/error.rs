//! Error types for formwork-expression
//!
//! Uses thiserror for clean, idiomatic Rust error definitions.

use serde::Serialize;
use thiserror::Error;

/// Result type for expression operations
pub type ExpressionResult<T> = Result<T, ExpressionError>;

/// Coarse classification shared by every Formwork error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed expression text
    Syntax,
    /// Unknown identifier or function
    Resolution,
    /// Operator or function applied to an incompatible value
    Type,
    /// Ill-formed condition or schema
    Structural,
    /// Dependency cycle between fields
    Cycle,
    /// A registered function or transformer failed
    Function,
    /// Depth or reentrancy guard tripped
    Limit,
}

// ============================================================================
// Main Error Type
// ============================================================================

/// Expression parsing and evaluation errors
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    /// Malformed delimiters, unexpected tokens or trailing content
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { message: String, offset: usize },

    /// Identifier not found in locals, registry or form data
    #[error("unresolved reference '{name}'")]
    UnresolvedReference { name: String },

    /// Call to a function that is not registered
    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    /// Type mismatch
    #[error("type error: expected {expected}, found {actual}")]
    Type { expected: String, actual: String },

    /// Invalid function argument
    #[error("invalid argument for {function}: {message}")]
    InvalidArgument { function: String, message: String },

    /// A registered function reported a failure
    #[error("function '{name}' failed: {message}")]
    Function { name: String, message: String },

    /// Nesting or resolution depth exceeded
    #[error("maximum depth of {limit} exceeded")]
    DepthExceeded { limit: usize },

    /// The same key was re-entered while it was still being resolved
    #[error("reentrant resolution of '{key}'")]
    Reentrant { key: String },
}

impl ExpressionError {
    /// Get error code for categorization
    pub fn code(&self) -> &'static str {
        match self {
            Self::Syntax { .. } => "EXPR:SYNTAX",
            Self::UnresolvedReference { .. } => "EXPR:UNRESOLVED",
            Self::UnknownFunction { .. } => "EXPR:FUNC_NOT_FOUND",
            Self::Type { .. } => "EXPR:TYPE",
            Self::InvalidArgument { .. } => "EXPR:INVALID_ARG",
            Self::Function { .. } => "EXPR:FUNCTION",
            Self::DepthExceeded { .. } => "EXPR:DEPTH",
            Self::Reentrant { .. } => "EXPR:REENTRANT",
        }
    }

    /// Broad category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Syntax { .. } => ErrorCategory::Syntax,
            Self::UnresolvedReference { .. } | Self::UnknownFunction { .. } => {
                ErrorCategory::Resolution
            }
            Self::Type { .. } => ErrorCategory::Type,
            Self::InvalidArgument { .. } | Self::Function { .. } => ErrorCategory::Function,
            Self::DepthExceeded { .. } | Self::Reentrant { .. } => ErrorCategory::Limit,
        }
    }

    /// Whether the error came from a name that could not be resolved
    pub fn is_unresolved(&self) -> bool {
        matches!(
            self,
            Self::UnresolvedReference { .. } | Self::UnknownFunction { .. }
        )
    }

    // ============================================================================
    // Convenience Constructors
    // ============================================================================

    /// Create a syntax error at a byte offset
    pub fn syntax(message: impl Into<String>, offset: usize) -> Self {
        Self::Syntax {
            message: message.into(),
            offset,
        }
    }

    /// Create an unresolved reference error
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self::UnresolvedReference { name: name.into() }
    }

    /// Create an unknown function error
    pub fn unknown_function(name: impl Into<String>) -> Self {
        Self::UnknownFunction { name: name.into() }
    }

    /// Create a type error
    pub fn type_error(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::Type {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            function: function.into(),
            message: message.into(),
        }
    }

    /// Create a function failure error
    pub fn function(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Function {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a depth exceeded error
    pub fn depth_exceeded(limit: usize) -> Self {
        Self::DepthExceeded { limit }
    }

    /// Create a reentrancy error
    pub fn reentrant(key: impl Into<String>) -> Self {
        Self::Reentrant { key: key.into() }
    }
}
