//! Request context types.
//!
//! The [`RequestContext`] is what a handler receives alongside its decoded
//! input: the request id, the endpoint name, bound parameters, the caller's
//! identity and a cancellation signal.

use crate::cancel::CancelSignal;
use crate::identity::{Identity, NoIdentity};
use crate::params::Params;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which keeps ids sortable in logs.
///
/// # Example
///
/// ```
/// use daedalus_core::RequestId;
///
/// let id = RequestId::new();
/// assert_eq!(id.to_string().len(), 36);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new request id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wraps an existing UUID, e.g. one parsed from an inbound header.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Per-request state handed to handlers.
///
/// Cheap to clone: identity and cancellation are shared.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: RequestId,
    endpoint: Arc<str>,
    params: Params,
    identity: Arc<dyn Identity>,
    cancel: CancelSignal,
    started_at: Instant,
}

impl RequestContext {
    /// Creates a context for `endpoint` with an anonymous caller.
    #[must_use]
    pub fn new(endpoint: impl Into<Arc<str>>) -> Self {
        Self {
            request_id: RequestId::new(),
            endpoint: endpoint.into(),
            params: Params::new(),
            identity: Arc::new(NoIdentity),
            cancel: CancelSignal::new(),
            started_at: Instant::now(),
        }
    }

    /// Creates a context for tests.
    #[must_use]
    pub fn mock() -> Self {
        Self::new("mock")
    }

    /// Replaces the request id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    /// Replaces the parameters.
    #[must_use]
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Replaces the identity.
    #[must_use]
    pub fn with_identity(mut self, identity: Arc<dyn Identity>) -> Self {
        self.identity = identity;
        self
    }

    /// Replaces the cancellation signal.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the request id.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Name of the endpoint being served.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// All bound path and query parameters.
    #[must_use]
    pub const fn params(&self) -> &Params {
        &self.params
    }

    /// Shorthand for `params().get(name)`.
    ///
    /// Path parameters are always present once the handler runs. Query
    /// parameters are optional: one the caller did not send is `None`, so
    /// handlers pick their own default.
    ///
    /// ```
    /// use daedalus_core::{Params, RequestContext};
    ///
    /// let ctx = RequestContext::mock().with_params(Params::new().with("id", "7"));
    /// assert_eq!(ctx.param("id"), Some("7"));
    /// assert_eq!(ctx.param("fields").unwrap_or("all"), "all");
    /// ```
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// The caller.
    #[must_use]
    pub fn identity(&self) -> &dyn Identity {
        self.identity.as_ref()
    }

    /// Shared handle to the caller.
    #[must_use]
    pub fn identity_arc(&self) -> Arc<dyn Identity> {
        Arc::clone(&self.identity)
    }

    /// The request's cancellation signal.
    #[must_use]
    pub const fn cancel(&self) -> &CancelSignal {
        &self.cancel
    }

    /// Returns `true` once the request was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::CallerIdentity;

    #[test]
    fn test_request_id_new_generates_unique_ids() {
        assert_ne!(RequestId::new(), RequestId::new());
    }

    #[test]
    fn test_request_id_serialization() {
        let id = RequestId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: RequestId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_new_context_is_anonymous() {
        let ctx = RequestContext::new("getUser");
        assert_eq!(ctx.endpoint(), "getUser");
        assert!(!ctx.identity().is_authenticated());
        assert!(ctx.params().is_empty());
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn test_builder_pattern() {
        let ctx = RequestContext::mock()
            .with_params(Params::new().with("id", "9"))
            .with_identity(Arc::new(CallerIdentity::new("u-1")));

        assert_eq!(ctx.param("id"), Some("9"));
        assert_eq!(ctx.identity().id(), "u-1");
    }

    #[test]
    fn test_absent_param_is_none() {
        let ctx = RequestContext::mock().with_params(Params::new().with("id", "9"));
        assert_eq!(ctx.param("fields"), None);
        assert_eq!(ctx.param("ID"), None);
    }

    #[test]
    fn test_clones_share_cancellation() {
        let ctx = RequestContext::mock();
        let clone = ctx.clone();
        ctx.cancel().trigger();
        assert!(clone.is_cancelled());
    }
}
