//! Response construction.

use bytes::Bytes;
use daedalus_core::{ErrorDefinition, RequestId};
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;

use crate::request::REQUEST_ID_HEADER;

/// The response type produced by the request pipeline.
pub type Response = http::Response<Full<Bytes>>;

/// Used if an error body somehow fails to serialize.
const FALLBACK_ERROR_BODY: &[u8] = br#"{"code":"INTERNAL_ERROR","message":"internal server error"}"#;

/// Extension trait for building pipeline responses.
pub trait ResponseExt: Sized {
    /// A JSON response with an already-encoded body.
    fn json(status: StatusCode, body: Bytes) -> Self;

    /// A response with no body.
    fn empty(status: StatusCode) -> Self;

    /// The wire form of a typed error: its status and
    /// `{"code", "message", "details"?}`.
    fn from_error(error: &ErrorDefinition) -> Self;

    /// Sets `x-request-id`.
    #[must_use]
    fn with_request_id(self, request_id: RequestId) -> Self;

    /// Appends `headers`, keeping any already set.
    #[must_use]
    fn with_headers(self, headers: &HeaderMap) -> Self;

    /// Appends one header.
    #[must_use]
    fn with_header(self, name: HeaderName, value: HeaderValue) -> Self;
}

impl ResponseExt for Response {
    fn json(status: StatusCode, body: Bytes) -> Self {
        let mut response = http::Response::new(Full::new(body));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }

    fn empty(status: StatusCode) -> Self {
        let mut response = http::Response::new(Full::new(Bytes::new()));
        *response.status_mut() = status;
        response
    }

    fn from_error(error: &ErrorDefinition) -> Self {
        let body = serde_json::to_vec(&error.error_body()).map_or_else(
            |e| {
                tracing::error!(code = error.code(), error = %e, "failed to encode error body");
                Bytes::from_static(FALLBACK_ERROR_BODY)
            },
            Bytes::from,
        );
        Self::json(error.status(), body)
    }

    fn with_request_id(mut self, request_id: RequestId) -> Self {
        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            self.headers_mut()
                .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
        }
        self
    }

    fn with_headers(mut self, headers: &HeaderMap) -> Self {
        let existing: Vec<HeaderName> = self.headers().keys().cloned().collect();
        for (name, value) in headers {
            if !existing.contains(name) {
                self.headers_mut().append(name.clone(), value.clone());
            }
        }
        self
    }

    fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers_mut().append(name, value);
        self
    }
}
