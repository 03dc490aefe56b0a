//! Errors raised while installing a subscriber

use thiserror::Error;

/// Result alias for logger setup.
pub type LogResult<T> = Result<T, LogError>;

/// Logger setup failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    /// The level / directive string is not a valid `EnvFilter`.
    #[error("invalid filter `{filter}`: {reason}")]
    Filter { filter: String, reason: String },

    /// Unrecognised output format name.
    #[error("unknown log format `{0}` (expected pretty, compact or json)")]
    InvalidFormat(String),

    /// A global subscriber is already set.
    #[error("logger already initialised: {0}")]
    Init(String),
}

impl LogError {
    pub fn filter(filter: impl Into<String>, reason: impl ToString) -> Self {
        Self::Filter {
            filter: filter.into(),
            reason: reason.to_string(),
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Filter { .. } => "LOG:FILTER",
            Self::InvalidFormat(_) => "LOG:FORMAT",
            Self::Init(_) => "LOG:INIT",
        }
    }
}
