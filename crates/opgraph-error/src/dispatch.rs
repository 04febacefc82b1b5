// Dispatch error types

use std::any::Any;

use thiserror::Error;

use crate::{ErrorDomain, OpGraphError, RegistryError};

/// Errors raised while selecting or binding an operation for a call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No registered variant statically accepts the argument types. Only
    /// raised under the strict dispatch policy; the permissive policy
    /// reports the miss alongside a fallback operation instead.
    #[error("No valid op found for {op} with argument types ({arg_types})")]
    Miss { op: String, arg_types: String },

    /// Call-site arguments cannot be bound to the operation's parameters
    #[error("Cannot bind arguments for op {op}: {reason}")]
    Bind { op: String, reason: String },

    /// Registry lookup failed
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl OpGraphError for DispatchError {
    fn error_code(&self) -> &'static str {
        match self {
            DispatchError::Miss { .. } => "DISPATCH_MISS",
            DispatchError::Bind { .. } => "DISPATCH_BIND",
            DispatchError::Registry(inner) => inner.error_code(),
        }
    }

    fn domain(&self) -> ErrorDomain {
        match self {
            DispatchError::Registry(_) => ErrorDomain::Registry,
            _ => ErrorDomain::Dispatch,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Result type for dispatch operations
pub type DispatchResult<T> = Result<T, DispatchError>;
