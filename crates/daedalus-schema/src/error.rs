//! Error types for document assembly.

use thiserror::Error;

/// Errors that can occur while assembling a document.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Failed to serialize the document.
    #[error("failed to serialize document: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The endpoint uses a method OpenAPI cannot describe.
    #[error("endpoint '{endpoint}' uses unsupported method {method}")]
    UnsupportedMethod {
        /// Endpoint name.
        endpoint: String,
        /// The method.
        method: String,
    },

    /// Two endpoints share a method and path.
    #[error("endpoints '{first}' and '{second}' both serve {method} {path}")]
    DuplicateOperation {
        /// Method.
        method: String,
        /// Path template.
        path: String,
        /// The endpoint registered first.
        first: String,
        /// The endpoint registered second.
        second: String,
    },
}

/// Result type for document assembly.
pub type SchemaResult<T> = Result<T, SchemaError>;
