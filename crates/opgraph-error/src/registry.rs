// Registry error types

use std::any::Any;

use thiserror::Error;

use crate::{ErrorDomain, OpGraphError};

/// Errors raised by the operation registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// An operation with the same fully-qualified name is already registered
    #[error("Duplicate registration for operation: {0}")]
    DuplicateOperation(String),

    /// No operation is registered under the requested name
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// A writer panicked while holding the registry lock
    #[error("Registry lock poisoned: {0}")]
    LockPoisoned(String),
}

impl OpGraphError for RegistryError {
    fn error_code(&self) -> &'static str {
        match self {
            RegistryError::DuplicateOperation(_) => "REGISTRY_DUPLICATE_OPERATION",
            RegistryError::UnknownOperation(_) => "REGISTRY_UNKNOWN_OPERATION",
            RegistryError::LockPoisoned(_) => "REGISTRY_LOCK_POISONED",
        }
    }

    fn domain(&self) -> ErrorDomain {
        ErrorDomain::Registry
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;
