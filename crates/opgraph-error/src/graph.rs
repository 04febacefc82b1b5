// Graph error types
// Raised while building expression graphs or analysing them

use std::any::Any;

use thiserror::Error;

use crate::{
    DeclarationError, DispatchError, ErrorDomain, ExternalError, OpGraphError, RegistryError,
};

/// Errors related to graph construction and analysis
#[derive(Error, Debug)]
pub enum GraphError {
    /// A node does not have the shape an analysis expects
    #[error("Malformed graph: {0}")]
    MalformedGraph(String),

    /// An evaluator is required but none is configured
    #[error("No evaluator configured to run {0}")]
    NoEvaluator(String),

    /// The evaluator or the code it runs failed
    #[error("Evaluation of {op} failed: {source}")]
    Evaluation {
        op: String,
        #[source]
        source: ExternalError,
    },

    /// A refiner did not answer in time
    #[error("Refining output type of {op} timed out after {timeout_ms}ms")]
    RefineTimeout { op: String, timeout_ms: u64 },

    /// A method was called on a node whose type does not expose it
    #[error("Node of type {ty} has no method `{method}`")]
    UnsupportedMethod { method: String, ty: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Declaration(#[from] DeclarationError),
}

impl OpGraphError for GraphError {
    fn error_code(&self) -> &'static str {
        match self {
            GraphError::MalformedGraph(_) => "GRAPH_MALFORMED",
            GraphError::NoEvaluator(_) => "GRAPH_NO_EVALUATOR",
            GraphError::Evaluation { source, .. } => source.error_code(),
            GraphError::RefineTimeout { .. } => "GRAPH_REFINE_TIMEOUT",
            GraphError::UnsupportedMethod { .. } => "GRAPH_UNSUPPORTED_METHOD",
            GraphError::Registry(inner) => inner.error_code(),
            GraphError::Dispatch(inner) => inner.error_code(),
            GraphError::Declaration(inner) => inner.error_code(),
        }
    }

    fn domain(&self) -> ErrorDomain {
        match self {
            GraphError::Registry(inner) => inner.domain(),
            GraphError::Dispatch(inner) => inner.domain(),
            GraphError::Declaration(inner) => inner.domain(),
            GraphError::Evaluation { source, .. } => source.domain(),
            _ => ErrorDomain::Graph,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

impl GraphError {
    /// Create a new malformed graph error
    pub fn malformed(message: impl Into<String>) -> Self {
        GraphError::MalformedGraph(message.into())
    }

    /// Wrap a failure raised while evaluating `op`
    pub fn evaluation(op: impl Into<String>, source: impl Into<ExternalError>) -> Self {
        GraphError::Evaluation {
            op: op.into(),
            source: source.into(),
        }
    }
}
