// Types-specific error types
// These errors are raised by the opgraph-types crate

use std::any::Any;

use thiserror::Error;

use crate::{ErrorDomain, OpGraphError};

/// Errors raised while building or interpreting types and values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypesError {
    /// A host-language type hint could not be parsed
    #[error("Failed to parse type hint `{hint}`: {reason}")]
    HintParse { hint: String, reason: String },

    /// A type hint names a host type with no registered counterpart
    #[error("No type registered for host type `{0}`")]
    UnregisteredHostType(String),

    /// A relative access path does not fit the value it was applied to
    #[error("Invalid access path: {0}")]
    InvalidPath(String),
}

impl OpGraphError for TypesError {
    fn error_code(&self) -> &'static str {
        match self {
            TypesError::HintParse { .. } => "TYPES_HINT_PARSE",
            TypesError::UnregisteredHostType(_) => "TYPES_UNREGISTERED_HOST_TYPE",
            TypesError::InvalidPath(_) => "TYPES_INVALID_PATH",
        }
    }

    fn domain(&self) -> ErrorDomain {
        ErrorDomain::Types
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Convenient Result type for types operations
pub type TypesResult<T> = Result<T, TypesError>;

impl TypesError {
    /// Create a new hint parse error
    pub fn hint_parse(hint: impl Into<String>, reason: impl Into<String>) -> Self {
        TypesError::HintParse {
            hint: hint.into(),
            reason: reason.into(),
        }
    }

    /// Create a new invalid path error
    pub fn invalid_path(message: impl Into<String>) -> Self {
        TypesError::InvalidPath(message.into())
    }
}
