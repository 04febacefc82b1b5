// Conversion of failures raised outside the opgraph crates
// Resolver bodies, setters and evaluators report through anyhow

use std::any::Any;

use thiserror::Error;

use crate::{ErrorDomain, OpGraphError};

/// Errors that come from outside the opgraph crates
#[derive(Error, Debug)]
pub enum ExternalError {
    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Other external error
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for ExternalError {
    fn from(err: anyhow::Error) -> Self {
        // Alternate formatting keeps the whole context chain
        ExternalError::Other(format!("{:#}", err))
    }
}

impl From<std::io::Error> for ExternalError {
    fn from(err: std::io::Error) -> Self {
        ExternalError::Io(err.to_string())
    }
}

impl From<&str> for ExternalError {
    fn from(message: &str) -> Self {
        ExternalError::Other(message.to_string())
    }
}

impl OpGraphError for ExternalError {
    fn error_code(&self) -> &'static str {
        match self {
            ExternalError::Io(_) => "EXTERNAL_IO",
            ExternalError::Other(_) => "EXTERNAL_OTHER",
        }
    }

    fn domain(&self) -> ErrorDomain {
        ErrorDomain::External
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn anyhow_errors_keep_their_context() {
        let result: anyhow::Result<()> = Err(anyhow::anyhow!("resolver exploded"));
        let err = ExternalError::from(result.context("evaluating number-add").unwrap_err());
        assert_eq!(err.error_code(), "EXTERNAL_OTHER");
        assert_eq!(err.domain(), ErrorDomain::External);
        assert_eq!(err.to_string(), "evaluating number-add: resolver exploded");
    }

    #[test]
    fn io_errors_are_classified() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "no threads left");
        assert_eq!(ExternalError::from(io).error_code(), "EXTERNAL_IO");
    }
}
