//! Failures surfaced to the embedding server.
//!
//! The client always receives a finished response. A [`PipelineFailure`] is
//! reported next to it when the outcome needs attention from operators: the
//! handler broke its contract or failed in a way the client must not see.

use daedalus_core::{ErrorDefinition, ValidationViolation};
use thiserror::Error;

/// A failure behind a 500 response.
#[derive(Debug, Error)]
pub enum PipelineFailure {
    /// The handler returned a typed error the endpoint never declared.
    #[error("endpoint '{endpoint}' returned undeclared error {}", .error.code())]
    UndeclaredError {
        /// Endpoint name.
        endpoint: String,
        /// The error the handler returned.
        #[source]
        error: ErrorDefinition,
    },

    /// The handler returned an untyped error.
    #[error("endpoint '{endpoint}' failed: {source}")]
    Handler {
        /// Endpoint name.
        endpoint: String,
        /// The original error, for logging only.
        source: anyhow::Error,
    },

    /// The handler's output broke its own validation rules.
    #[error("endpoint '{endpoint}' produced invalid output ({} violations)", .violations.len())]
    OutputValidation {
        /// Endpoint name.
        endpoint: String,
        /// What failed.
        violations: Vec<ValidationViolation>,
    },

    /// The handler's output could not be encoded.
    #[error("endpoint '{endpoint}' output could not be encoded: {source}")]
    Encode {
        /// Endpoint name.
        endpoint: String,
        /// The encoder error.
        source: serde_json::Error,
    },
}

impl PipelineFailure {
    /// The endpoint that failed.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        match self {
            Self::UndeclaredError { endpoint, .. }
            | Self::Handler { endpoint, .. }
            | Self::OutputValidation { endpoint, .. }
            | Self::Encode { endpoint, .. } => endpoint,
        }
    }

    /// Returns `true` for an undeclared typed error, the case worth alerting on.
    #[must_use]
    pub const fn is_undeclared(&self) -> bool {
        matches!(self, Self::UndeclaredError { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daedalus_core::errors;
    use std::error::Error as _;

    #[test]
    fn test_undeclared_error() {
        let failure = PipelineFailure::UndeclaredError {
            endpoint: "getOrder".into(),
            error: errors::not_found(),
        };
        assert!(failure.is_undeclared());
        assert_eq!(failure.endpoint(), "getOrder");
        assert_eq!(
            failure.to_string(),
            "endpoint 'getOrder' returned undeclared error NOT_FOUND"
        );
        assert!(failure.source().is_some());
    }

    #[test]
    fn test_handler_failure_keeps_source() {
        let failure = PipelineFailure::Handler {
            endpoint: "getOrder".into(),
            source: anyhow::anyhow!("db down"),
        };
        assert!(!failure.is_undeclared());
        assert!(failure.to_string().contains("db down"));
    }
}
