use formwork_expression::ErrorCategory;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Error raised while checking a form schema.
///
/// Every variant blocks acceptance of the schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Two siblings share an id.
    #[error("duplicate field id `{id}` under `{parent}`")]
    DuplicateId { id: String, parent: String },

    /// Field id does not meet naming rules.
    #[error("invalid field id `{id}`: {reason}")]
    InvalidId { id: String, reason: String },

    /// A condition, default, option source or rule is ill-formed.
    #[error("{path}: {message}")]
    Structural { path: String, message: String },
}

impl SchemaError {
    /// Broad error category shared with the other Formwork error types.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::Structural
    }

    /// Machine-readable error code for programmatic handling.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateId { .. } => "SCHEMA:DUPLICATE_ID",
            Self::InvalidId { .. } => "SCHEMA:INVALID_ID",
            Self::Structural { .. } => "SCHEMA:STRUCTURAL",
        }
    }

    pub fn duplicate_id(id: impl Into<String>, parent: impl Into<String>) -> Self {
        Self::DuplicateId {
            id: id.into(),
            parent: parent.into(),
        }
    }

    pub fn invalid_id(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidId {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn structural(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Structural {
            path: path.into(),
            message: message.into(),
        }
    }
}
