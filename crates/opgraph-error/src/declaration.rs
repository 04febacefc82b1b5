// Declaration error types
// Raised when an operation's declared types disagree with its resolver

use std::any::Any;

use thiserror::Error;

use crate::{ErrorDomain, OpGraphError, RegistryError, TypesError};

/// Errors raised while declaring an operation. A failed declaration never
/// registers anything.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeclarationError {
    /// A resolver parameter has neither a declared nor an inferrable type
    #[error("Type declaration missing for arg `{param}` of op {op}")]
    MissingTypeAnnotation { op: String, param: String },

    /// The resolver's hinted parameter type does not fit the declared type
    #[error("Hinted type `{inferred}` of arg `{param}` is incompatible with declared type `{declared}` in op {op}")]
    IncompatibleInputType {
        op: String,
        param: String,
        declared: String,
        inferred: String,
    },

    /// The resolver's hinted return type does not fit the declared output type
    #[error("Hinted return type `{inferred}` is not assignable to declared output type `{declared}` in op {op}")]
    IncompatibleOutputType {
        op: String,
        declared: String,
        inferred: String,
    },

    /// A computed output type leaves no room for a hinted return type
    #[error("Output type of op {op} is computed, but the resolver also hints return type `{hint}`")]
    ComputedOutputWithReturnHint { op: String, hint: String },

    /// Neither a declared nor an inferrable output type exists
    #[error("Output type must be declared for op {op}")]
    UndeclaredOutputType { op: String },

    /// The declared parameter names do not match the resolver's parameters
    #[error("Declared input names {declared:?} do not match resolver parameters {resolver:?} in op {op}")]
    ParameterMismatch {
        op: String,
        declared: Vec<String>,
        resolver: Vec<String>,
    },

    /// A derived operation cannot be generated from its base
    #[error("Cannot derive `{kind}` variant of op {op}: {reason}")]
    InvalidDerivation {
        op: String,
        kind: String,
        reason: String,
    },

    /// A type hint could not be turned into a type
    #[error(transparent)]
    Hint(#[from] TypesError),

    /// Registration failed
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl OpGraphError for DeclarationError {
    fn error_code(&self) -> &'static str {
        match self {
            DeclarationError::MissingTypeAnnotation { .. } => "DECL_MISSING_TYPE_ANNOTATION",
            DeclarationError::IncompatibleInputType { .. } => "DECL_INCOMPATIBLE_INPUT_TYPE",
            DeclarationError::IncompatibleOutputType { .. } => "DECL_INCOMPATIBLE_OUTPUT_TYPE",
            DeclarationError::ComputedOutputWithReturnHint { .. } => {
                "DECL_COMPUTED_OUTPUT_WITH_RETURN_HINT"
            }
            DeclarationError::UndeclaredOutputType { .. } => "DECL_UNDECLARED_OUTPUT_TYPE",
            DeclarationError::ParameterMismatch { .. } => "DECL_PARAMETER_MISMATCH",
            DeclarationError::InvalidDerivation { .. } => "DECL_INVALID_DERIVATION",
            DeclarationError::Hint(inner) => inner.error_code(),
            DeclarationError::Registry(inner) => inner.error_code(),
        }
    }

    fn domain(&self) -> ErrorDomain {
        match self {
            DeclarationError::Hint(_) => ErrorDomain::Types,
            DeclarationError::Registry(_) => ErrorDomain::Registry,
            _ => ErrorDomain::Declaration,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Result type for declarations
pub type DeclarationResult<T> = Result<T, DeclarationError>;
