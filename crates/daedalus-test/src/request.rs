//! Test request building.

use std::sync::Arc;

use bytes::Bytes;
use daedalus_core::{CancelSignal, Identity, Params, RequestId};
use daedalus_pipeline::{BoxError, RequestBody, RoutedRequest, REQUEST_ID_HEADER};
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use http_body_util::{BodyExt, Full};
use serde::Serialize;

use crate::error::TestError;

/// Entry points for building routed test requests.
///
/// Requests skip routing entirely: path parameters are set with
/// [`TestRequestBuilder::param`] as a router would have extracted them.
pub struct TestRequest;

impl TestRequest {
    /// Creates a new GET request.
    pub fn get(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::GET, uri)
    }

    /// Creates a new POST request.
    pub fn post(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::POST, uri)
    }

    /// Creates a new PUT request.
    pub fn put(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PUT, uri)
    }

    /// Creates a new PATCH request.
    pub fn patch(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PATCH, uri)
    }

    /// Creates a new DELETE request.
    pub fn delete(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::DELETE, uri)
    }
}

/// Builder for routed test requests.
///
/// Invalid headers or bodies are remembered and reported by
/// [`build`](Self::build), so calls can be chained freely.
///
/// # Example
///
/// ```
/// use daedalus_core::CallerIdentity;
/// use daedalus_test::TestRequest;
/// use serde_json::json;
///
/// let request = TestRequest::post("/orders/7/items")
///     .param("order_id", "7")
///     .query("dry_run", "true")
///     .json(&json!({"sku": "A-1", "quantity": 2}))
///     .identity(CallerIdentity::new("u-1").with_scopes(["orders:write"]))
///     .build()
///     .unwrap();
///
/// assert_eq!(request.params().get("order_id"), Some("7"));
/// assert_eq!(request.uri().query(), Some("dry_run=true"));
/// assert_eq!(request.headers()["content-type"], "application/json");
/// ```
#[must_use]
pub struct TestRequestBuilder {
    method: Method,
    uri: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    params: Params,
    body: Bytes,
    identity: Option<Arc<dyn Identity>>,
    cancel: Option<CancelSignal>,
    error: Option<TestError>,
}

impl TestRequestBuilder {
    /// Creates a new request builder.
    pub fn new(method: Method, uri: impl AsRef<str>) -> Self {
        Self {
            method,
            uri: uri.as_ref().to_string(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            params: Params::new(),
            body: Bytes::new(),
            identity: None,
            cancel: None,
            error: None,
        }
    }

    /// Sets a header on the request.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = HeaderName::try_from(name.as_ref());
        let value = HeaderValue::try_from(value.as_ref());
        match (name, value) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            (Err(e), _) => self.fail(TestError::InvalidHeader(e.to_string())),
            (_, Err(e)) => self.fail(TestError::InvalidHeader(e.to_string())),
        }
        self
    }

    /// Sets a typed header on the request.
    pub fn header_typed(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the Content-Type header.
    pub fn content_type(self, content_type: impl AsRef<str>) -> Self {
        self.header(header::CONTENT_TYPE.as_str(), content_type)
    }

    /// Sets `x-request-id`.
    pub fn request_id(self, request_id: RequestId) -> Self {
        self.header(REQUEST_ID_HEADER, request_id.to_string())
    }

    /// Appends a query string pair.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Sets a path parameter as the router would have matched it.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push(name, value);
        self
    }

    /// Sets a JSON body and its Content-Type.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                self.body = Bytes::from(bytes);
                self.headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
            }
            Err(e) => self.fail(TestError::Json(e)),
        }
        self
    }

    /// Sets a raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Attaches the caller identity an authenticator would have resolved.
    pub fn identity(self, identity: impl Identity) -> Self {
        self.shared_identity(Arc::new(identity))
    }

    /// Attaches an already shared identity.
    pub fn shared_identity(mut self, identity: Arc<dyn Identity>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Attaches a cancellation signal the test can trigger.
    pub fn cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Builds a request with an in-memory body.
    ///
    /// # Errors
    ///
    /// Returns the first error recorded while building, or a URI parse error.
    pub fn build(self) -> Result<RoutedRequest<Full<Bytes>>, TestError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let uri = if self.query.is_empty() {
            self.uri
        } else {
            let query = serde_urlencoded::to_string(&self.query)
                .map_err(|e| TestError::RequestBuild(e.to_string()))?;
            let separator = if self.uri.contains('?') { '&' } else { '?' };
            format!("{}{separator}{query}", self.uri)
        };
        let uri: Uri = uri
            .parse()
            .map_err(|e: http::uri::InvalidUri| TestError::RequestBuild(e.to_string()))?;

        let mut request = RoutedRequest::new(self.method, uri, Full::new(self.body))
            .with_headers(self.headers)
            .with_params(self.params);
        if let Some(identity) = self.identity {
            request = request.with_identity(identity);
        }
        if let Some(cancel) = self.cancel {
            request = request.with_cancel(cancel);
        }
        Ok(request)
    }

    /// Builds a request with a boxed body, as served through
    /// [`ErasedEndpoint`](daedalus_pipeline::ErasedEndpoint).
    ///
    /// # Errors
    ///
    /// Same as [`build`](Self::build).
    pub fn build_boxed(self) -> Result<RoutedRequest<RequestBody>, TestError> {
        let request = self.build()?;
        Ok(request.map_body(|body| body.map_err(BoxError::from).boxed()))
    }

    fn fail(&mut self, error: TestError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daedalus_core::CallerIdentity;

    #[test]
    fn test_query_is_encoded() {
        let request = TestRequest::get("/search")
            .query("q", "a b")
            .query("tag", "x&y")
            .build()
            .unwrap();
        assert_eq!(request.uri().query(), Some("q=a+b&tag=x%26y"));
        assert_eq!(
            request.query_pairs(),
            vec![
                ("q".to_string(), "a b".to_string()),
                ("tag".to_string(), "x&y".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_appends_to_existing() {
        let request = TestRequest::get("/search?page=2")
            .query("q", "rust")
            .build()
            .unwrap();
        assert_eq!(request.uri().query(), Some("page=2&q=rust"));
    }

    #[test]
    fn test_invalid_header_is_reported_at_build() {
        let result = TestRequest::get("/")
            .header("bad header", "x")
            .header("x-ok", "fine")
            .build();
        assert!(matches!(result, Err(TestError::InvalidHeader(_))));
    }

    #[test]
    fn test_invalid_uri() {
        let result = TestRequest::get("not a uri").build();
        assert!(matches!(result, Err(TestError::RequestBuild(_))));
    }

    #[test]
    fn test_params_and_identity() {
        let request = TestRequest::delete("/users/9")
            .param("id", "9")
            .identity(CallerIdentity::new("admin"))
            .build()
            .unwrap();
        assert_eq!(request.method(), Method::DELETE);
        assert_eq!(request.params().get("id"), Some("9"));
    }

    #[test]
    fn test_request_id_header() {
        let id = RequestId::new();
        let request = TestRequest::get("/").request_id(id).build().unwrap();
        assert_eq!(request.inbound_request_id(), Some(id));
    }
}
