//! Typed error definitions.
//!
//! An [`ErrorDefinition`] is an immutable value carrying a stable `code`, an
//! HTTP status, a human-readable message, optional structured details and an
//! optional cause. Code and status are fixed at construction; everything else
//! is derived through the non-mutating `with_*` operations, so a shared
//! sentinel can be specialised per call site from any number of tasks.
//!
//! Two definitions match when their codes are equal. Message, details and
//! cause never take part in matching.
//!
//! # Example
//!
//! ```
//! use daedalus_core::errors;
//!
//! let not_found = errors::not_found();
//! let derived = not_found.with_message("user 42 does not exist");
//!
//! assert!(derived.is(&not_found));
//! assert_eq!(not_found.message(), "not found");
//! assert_eq!(derived.status(), http::StatusCode::NOT_FOUND);
//! ```

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use crate::spec::strip_type_path;
use crate::validate::ValidationViolation;

/// A shared, thread-safe error cause.
pub type Cause = Arc<dyn StdError + Send + Sync + 'static>;

/// Immutable, code-identified error value.
///
/// Handlers return these (usually via `?` into `anyhow::Error`) to produce a
/// documented error response. The pipeline only honours a definition whose
/// code the endpoint declared up front.
#[derive(Clone)]
pub struct ErrorDefinition {
    code: Cow<'static, str>,
    status: StatusCode,
    message: String,
    details: Option<serde_json::Value>,
    details_type: Option<&'static str>,
    cause: Option<Cause>,
}

impl ErrorDefinition {
    /// Creates a new definition. Code and status cannot change afterwards.
    #[must_use]
    pub fn new(
        code: impl Into<Cow<'static, str>>,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            status,
            message: message.into(),
            details: None,
            details_type: None,
            cause: None,
        }
    }

    /// Records the type whose shape documents this error's `details`.
    ///
    /// Used when defining a sentinel; the type name is picked up by document
    /// assembly.
    #[must_use]
    pub fn documents_details<D: ?Sized>(mut self) -> Self {
        self.details_type = Some(std::any::type_name::<D>());
        self
    }

    /// Returns a copy with a different message.
    #[must_use]
    pub fn with_message(&self, message: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.message = message.into();
        next
    }

    /// Returns a copy carrying the given details.
    ///
    /// Details that fail to serialize are dropped from the copy.
    #[must_use]
    pub fn with_details<D: Serialize + ?Sized>(&self, details: &D) -> Self {
        let mut next = self.clone();
        next.details = match serde_json::to_value(details) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(code = %self.code, error = %e, "dropping unserializable error details");
                None
            }
        };
        next
    }

    /// Returns a copy carrying already-serialized details.
    #[must_use]
    pub fn with_details_value(&self, details: serde_json::Value) -> Self {
        let mut next = self.clone();
        next.details = Some(details);
        next
    }

    /// Returns a copy wrapping the given cause.
    #[must_use]
    pub fn with_cause<E>(&self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.with_shared_cause(Arc::new(cause))
    }

    /// Returns a copy wrapping an already shared cause.
    #[must_use]
    pub fn with_shared_cause(&self, cause: Cause) -> Self {
        let mut next = self.clone();
        next.cause = Some(cause);
        next
    }

    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// HTTP status this error is written with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Structured details, if any.
    #[must_use]
    pub fn details(&self) -> Option<&serde_json::Value> {
        self.details.as_ref()
    }

    /// Bare name of the type documenting the details, if recorded.
    #[must_use]
    pub fn details_type(&self) -> Option<String> {
        self.details_type.map(strip_type_path)
    }

    /// The wrapped cause, if any. Never written to clients.
    #[must_use]
    pub fn cause(&self) -> Option<&Cause> {
        self.cause.as_ref()
    }

    /// Returns `true` when both definitions share the same code.
    #[must_use]
    pub fn is(&self, other: &ErrorDefinition) -> bool {
        self.code == other.code
    }

    /// Returns `true` when this definition carries `code`.
    #[must_use]
    pub fn has_code(&self, code: &str) -> bool {
        self.code == code
    }

    /// Builds the wire body for this error.
    #[must_use]
    pub fn error_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code.to_string(),
            message: self.message.clone(),
            details: self.details.clone(),
        }
    }
}

impl fmt::Debug for ErrorDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorDefinition")
            .field("code", &self.code)
            .field("status", &self.status.as_u16())
            .field("message", &self.message)
            .field("details", &self.details)
            .field("cause", &self.cause.as_ref().map(ToString::to_string))
            .finish()
    }
}

impl fmt::Display for ErrorDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl StdError for ErrorDefinition {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| cause.as_ref() as &(dyn StdError + 'static))
    }
}

/// Finds the first typed error in an `anyhow` chain.
///
/// Context layers added with `anyhow::Context` are looked through.
#[must_use]
pub fn find_definition(error: &anyhow::Error) -> Option<&ErrorDefinition> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<ErrorDefinition>())
}

/// Wire shape of every error response: `{"code", "message", "details"?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Structured details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Codes of the standard error library.
pub mod codes {
    /// 400
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    /// 401
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    /// 403
    pub const FORBIDDEN: &str = "FORBIDDEN";
    /// 404
    pub const NOT_FOUND: &str = "NOT_FOUND";
    /// 409
    pub const CONFLICT: &str = "CONFLICT";
    /// 413
    pub const PAYLOAD_TOO_LARGE: &str = "PAYLOAD_TOO_LARGE";
    /// 422
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    /// 429
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
    /// 500
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
    /// 501
    pub const NOT_IMPLEMENTED: &str = "NOT_IMPLEMENTED";
    /// 503
    pub const SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";
}

/// The standard error library.
///
/// Each function returns a fresh sentinel; derive call-site variants from it
/// with the `with_*` operations.
pub mod errors {
    use super::{codes, ErrorDefinition, ValidationViolation};
    use http::StatusCode;

    /// 400 Bad Request.
    #[must_use]
    pub fn bad_request() -> ErrorDefinition {
        ErrorDefinition::new(codes::BAD_REQUEST, StatusCode::BAD_REQUEST, "bad request")
    }

    /// 401 Unauthorized.
    #[must_use]
    pub fn unauthorized() -> ErrorDefinition {
        ErrorDefinition::new(
            codes::UNAUTHORIZED,
            StatusCode::UNAUTHORIZED,
            "authentication required",
        )
    }

    /// 403 Forbidden.
    #[must_use]
    pub fn forbidden() -> ErrorDefinition {
        ErrorDefinition::new(codes::FORBIDDEN, StatusCode::FORBIDDEN, "forbidden")
    }

    /// 404 Not Found.
    #[must_use]
    pub fn not_found() -> ErrorDefinition {
        ErrorDefinition::new(codes::NOT_FOUND, StatusCode::NOT_FOUND, "not found")
    }

    /// 409 Conflict.
    #[must_use]
    pub fn conflict() -> ErrorDefinition {
        ErrorDefinition::new(codes::CONFLICT, StatusCode::CONFLICT, "conflict")
    }

    /// 413 Payload Too Large.
    #[must_use]
    pub fn payload_too_large() -> ErrorDefinition {
        ErrorDefinition::new(
            codes::PAYLOAD_TOO_LARGE,
            StatusCode::PAYLOAD_TOO_LARGE,
            "request body too large",
        )
    }

    /// 422 Unprocessable Entity.
    #[must_use]
    pub fn validation_error() -> ErrorDefinition {
        ErrorDefinition::new(
            codes::VALIDATION_ERROR,
            StatusCode::UNPROCESSABLE_ENTITY,
            "validation failed",
        )
        .documents_details::<ValidationDetails>()
    }

    /// 429 Too Many Requests.
    #[must_use]
    pub fn rate_limited() -> ErrorDefinition {
        ErrorDefinition::new(
            codes::RATE_LIMITED,
            StatusCode::TOO_MANY_REQUESTS,
            "usage limit exceeded",
        )
    }

    /// 500 Internal Server Error.
    #[must_use]
    pub fn internal_error() -> ErrorDefinition {
        ErrorDefinition::new(
            codes::INTERNAL_ERROR,
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal server error",
        )
    }

    /// 501 Not Implemented.
    #[must_use]
    pub fn not_implemented() -> ErrorDefinition {
        ErrorDefinition::new(
            codes::NOT_IMPLEMENTED,
            StatusCode::NOT_IMPLEMENTED,
            "not implemented",
        )
    }

    /// 503 Service Unavailable.
    #[must_use]
    pub fn service_unavailable() -> ErrorDefinition {
        ErrorDefinition::new(
            codes::SERVICE_UNAVAILABLE,
            StatusCode::SERVICE_UNAVAILABLE,
            "service unavailable",
        )
    }

    /// All standard sentinels, in status order.
    #[must_use]
    pub fn standard_library() -> Vec<ErrorDefinition> {
        vec![
            bad_request(),
            unauthorized(),
            forbidden(),
            not_found(),
            conflict(),
            payload_too_large(),
            validation_error(),
            rate_limited(),
            internal_error(),
            not_implemented(),
            service_unavailable(),
        ]
    }

    /// A 422 carrying the per-field violation list.
    #[must_use]
    pub fn validation_failed(violations: Vec<ValidationViolation>) -> ErrorDefinition {
        validation_error().with_details(&ValidationDetails { violations })
    }

    /// Details of a 422 validation error.
    #[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    pub struct ValidationDetails {
        /// One entry per failed rule.
        pub violations: Vec<ValidationViolation>,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("connection reset")]
    struct Reset;

    #[test]
    fn test_derivations_leave_source_untouched() {
        let base = errors::not_found();
        let derived = base
            .with_message("order 7 missing")
            .with_details(&serde_json::json!({"order_id": 7}))
            .with_cause(Reset);

        assert_eq!(base.message(), "not found");
        assert!(base.details().is_none());
        assert!(base.cause().is_none());

        assert_eq!(derived.code(), codes::NOT_FOUND);
        assert_eq!(derived.status(), StatusCode::NOT_FOUND);
        assert_eq!(derived.message(), "order 7 missing");
        assert_eq!(derived.details().unwrap()["order_id"], 7);
        assert!(derived.is(&base));
    }

    #[test]
    fn test_matching_is_by_code_only() {
        let a = ErrorDefinition::new("QUOTA", StatusCode::FORBIDDEN, "a");
        let b = ErrorDefinition::new("QUOTA", StatusCode::TOO_MANY_REQUESTS, "b");
        let c = ErrorDefinition::new("OTHER", StatusCode::FORBIDDEN, "a");

        assert!(a.is(&b));
        assert!(!a.is(&c));
        assert!(a.has_code("QUOTA"));
    }

    #[test]
    fn test_error_body_shape() {
        let body = errors::conflict().with_message("already exists").error_body();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"code": "CONFLICT", "message": "already exists"}));

        let body = errors::bad_request()
            .with_details(&serde_json::json!({"field": "x"}))
            .error_body();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["details"]["field"], "x");
    }

    #[test]
    fn test_source_exposes_cause() {
        let err = errors::internal_error().with_cause(Reset);
        let source = StdError::source(&err).expect("cause should be the source");
        assert_eq!(source.to_string(), "connection reset");
    }

    #[test]
    fn test_find_definition_through_context() {
        use anyhow::Context;

        let result: anyhow::Result<()> = Err(errors::not_found().into());
        let err = result.context("loading profile").unwrap_err();

        let found = find_definition(&err).expect("typed error should be found");
        assert!(found.has_code(codes::NOT_FOUND));
    }

    #[test]
    fn test_find_definition_absent_for_opaque_errors() {
        let err = anyhow::anyhow!("disk on fire");
        assert!(find_definition(&err).is_none());
    }

    #[test]
    fn test_standard_library_statuses() {
        let statuses: Vec<u16> = errors::standard_library()
            .iter()
            .map(|e| e.status().as_u16())
            .collect();
        assert_eq!(
            statuses,
            vec![400, 401, 403, 404, 409, 413, 422, 429, 500, 501, 503]
        );
    }

    #[test]
    fn test_validation_failed_details() {
        let err = errors::validation_failed(vec![ValidationViolation::new("name", "required", "")]);
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.details_type().as_deref(), Some("ValidationDetails"));

        let details = err.details().unwrap();
        assert_eq!(details["violations"][0]["field"], "name");
        assert_eq!(details["violations"][0]["rule"], "required");
    }

    #[test]
    fn test_concurrent_derivation() {
        let sentinel = Arc::new(errors::forbidden());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let sentinel = Arc::clone(&sentinel);
                std::thread::spawn(move || sentinel.with_message(format!("denied {i}")))
            })
            .collect();

        for handle in handles {
            let derived = handle.join().unwrap();
            assert!(derived.is(&sentinel));
        }
        assert_eq!(sentinel.message(), "forbidden");
    }
}
