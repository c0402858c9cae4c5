//! Routed request input.
//!
//! Routing happens outside the pipeline. A router hands over the matched
//! request as a [`RoutedRequest`]: method, URI, headers, the path parameters
//! it extracted, the body and, when an authenticator ran upstream, the
//! caller's identity.

use std::sync::Arc;

use bytes::Bytes;
use daedalus_core::{CancelSignal, Identity, Params, RequestId};
use http::{HeaderMap, Method, Uri};
use http_body_util::Full;
use uuid::Uuid;

/// The header used to propagate request ids.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// A request that a router has matched to an endpoint.
#[derive(Debug)]
pub struct RoutedRequest<B> {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    params: Params,
    body: B,
    identity: Option<Arc<dyn Identity>>,
    cancel: Option<CancelSignal>,
}

impl<B> RoutedRequest<B> {
    /// Creates a routed request with no headers, parameters or identity.
    pub fn new(method: Method, uri: Uri, body: B) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            params: Params::new(),
            body,
            identity: None,
            cancel: None,
        }
    }

    /// Splits an `http::Request` together with the router's path parameters.
    pub fn from_http(request: http::Request<B>, params: Params) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            params,
            body,
            identity: None,
            cancel: None,
        }
    }

    /// Sets the matched path parameters.
    #[must_use]
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Replaces the headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Attaches the identity resolved by an upstream authenticator.
    #[must_use]
    pub fn with_identity(mut self, identity: Arc<dyn Identity>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Attaches the transport's cancellation signal.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Maps the body, keeping everything else.
    pub fn map_body<C>(self, f: impl FnOnce(B) -> C) -> RoutedRequest<C> {
        RoutedRequest {
            method: self.method,
            uri: self.uri,
            headers: self.headers,
            params: self.params,
            body: f(self.body),
            identity: self.identity,
            cancel: self.cancel,
        }
    }

    /// The request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The matched path parameters.
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Decoded query string pairs.
    ///
    /// A malformed query string yields no pairs.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let Some(query) = self.uri.query() else {
            return Vec::new();
        };
        serde_urlencoded::from_str(query).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "ignoring malformed query string");
            Vec::new()
        })
    }

    /// The inbound request id, if the header holds a valid UUID.
    #[must_use]
    pub fn inbound_request_id(&self) -> Option<RequestId> {
        self.headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(RequestId::from_uuid)
    }

    pub(crate) fn into_parts(self) -> RequestParts<B> {
        RequestParts {
            params: self.params,
            body: self.body,
            identity: self.identity,
            cancel: self.cancel,
        }
    }
}

impl RoutedRequest<Full<Bytes>> {
    /// A request whose body is already in memory.
    pub fn with_bytes(method: Method, uri: Uri, body: impl Into<Bytes>) -> Self {
        Self::new(method, uri, Full::new(body.into()))
    }
}

pub(crate) struct RequestParts<B> {
    pub(crate) params: Params,
    pub(crate) body: B,
    pub(crate) identity: Option<Arc<dyn Identity>>,
    pub(crate) cancel: Option<CancelSignal>,
}
