// opgraph Error Handling Framework
// Central location for error types, traits, and handling utilities

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;

// Re-export common error handling tools for convenience
pub use anyhow;
pub use thiserror;

// Module structure
mod conversion;

// Per-domain error enums
mod declaration;
mod dispatch;
mod graph;
mod registry;
mod types;

// Public exports
pub use conversion::ExternalError;
pub use declaration::{DeclarationError, DeclarationResult};
pub use dispatch::{DispatchError, DispatchResult};
pub use graph::{GraphError, GraphResult};
pub use registry::{RegistryError, RegistryResult};
pub use types::{TypesError, TypesResult};

/// Error domains representing different components of the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorDomain {
    Types,
    Declaration,
    Registry,
    Dispatch,
    Graph,
    External,
}

impl fmt::Display for ErrorDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorDomain::Types => write!(f, "types"),
            ErrorDomain::Declaration => write!(f, "declaration"),
            ErrorDomain::Registry => write!(f, "registry"),
            ErrorDomain::Dispatch => write!(f, "dispatch"),
            ErrorDomain::Graph => write!(f, "graph"),
            ErrorDomain::External => write!(f, "external"),
        }
    }
}

/// Base trait for all errors raised by the opgraph crates.
pub trait OpGraphError: StdError + fmt::Debug + fmt::Display + Send + Sync + Any + 'static {
    /// Returns a unique static string code for this error.
    fn error_code(&self) -> &'static str;

    /// The component that raised the error.
    fn domain(&self) -> ErrorDomain;

    /// Provides a brief description of the error (defaults to Display impl).
    fn description(&self) -> String {
        format!("{}", self)
    }

    /// Returns this error as a `&dyn Any` to allow downcasting.
    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trait_objects_keep_code_and_domain() {
        let err: &dyn OpGraphError = &RegistryError::UnknownOperation("number-add".into());
        assert_eq!(err.error_code(), "REGISTRY_UNKNOWN_OPERATION");
        assert_eq!(err.domain(), ErrorDomain::Registry);
        assert!(err
            .as_any()
            .downcast_ref::<RegistryError>()
            .is_some());
    }

    #[test]
    fn domain_display() {
        assert_eq!(ErrorDomain::Dispatch.to_string(), "dispatch");
    }
}
