//! Test response wrapper.

use std::fmt;

use bytes::Bytes;
use daedalus_core::ErrorBody;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;

use crate::error::TestError;
use crate::sse::{parse_frames, SseFrame};

/// A fully read response with helper methods for assertions.
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    /// Reads an HTTP response to the end.
    ///
    /// For event streams this waits until the stream finishes.
    ///
    /// # Errors
    ///
    /// Returns [`TestError::BodyRead`] if the body fails.
    pub async fn from_http<B>(response: http::Response<B>) -> Result<Self, TestError>
    where
        B: BodyExt,
        B::Error: fmt::Display,
    {
        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| TestError::BodyRead(e.to_string()))?
            .to_bytes();

        Ok(Self {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }

    /// Creates a test response from raw parts.
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the status code as a u16.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns true if the status is successful (2xx).
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns a reference to the headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Gets a header value by name.
    #[must_use]
    pub fn header(&self, name: impl AsRef<str>) -> Option<&HeaderValue> {
        self.headers.get(name.as_ref())
    }

    /// Gets a header value as a string.
    #[must_use]
    pub fn header_str(&self, name: impl AsRef<str>) -> Option<&str> {
        self.header(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the Content-Type header value.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header_str(header::CONTENT_TYPE.as_str())
    }

    /// Returns the raw body bytes.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid UTF-8.
    pub fn text(&self) -> Result<String, TestError> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| TestError::BodyRead(format!("invalid UTF-8: {e}")))
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`TestError::Json`] if the body does not decode.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        serde_json::from_slice(&self.body).map_err(TestError::Json)
    }

    /// Deserializes the body as a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`TestError::Json`] if the body does not decode.
    pub fn json_value(&self) -> Result<serde_json::Value, TestError> {
        self.json()
    }

    /// Deserializes the body as an error response.
    ///
    /// # Errors
    ///
    /// Returns [`TestError::Json`] if the body is not an error body.
    pub fn error_body(&self) -> Result<ErrorBody, TestError> {
        self.json()
    }

    /// Parses the body as a server-sent event stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid UTF-8.
    pub fn frames(&self) -> Result<Vec<SseFrame>, TestError> {
        Ok(parse_frames(&self.text()?))
    }

    /// Asserts that the status code equals the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status, expected,
            "expected status {expected}, got {} with body {}",
            self.status,
            String::from_utf8_lossy(&self.body)
        );
        self
    }

    /// Asserts that the status code equals the expected u16 value.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    pub fn assert_status_code(&self, expected: u16) -> &Self {
        assert_eq!(
            self.status.as_u16(),
            expected,
            "expected status {expected}, got {}",
            self.status.as_u16()
        );
        self
    }

    /// Asserts that a header exists with the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the header doesn't exist or doesn't match.
    pub fn assert_header(&self, name: impl AsRef<str>, expected: impl AsRef<str>) -> &Self {
        let name = name.as_ref();
        let expected = expected.as_ref();
        match self.header_str(name) {
            Some(actual) => assert_eq!(
                actual, expected,
                "expected header {name} to be {expected}, got {actual}"
            ),
            None => panic!("expected header {name} to be {expected}, but it is missing"),
        }
        self
    }

    /// Asserts that a header is present.
    ///
    /// # Panics
    ///
    /// Panics if the header is missing.
    pub fn assert_header_exists(&self, name: impl AsRef<str>) -> &Self {
        let name = name.as_ref();
        assert!(self.headers.contains_key(name), "expected header {name}");
        self
    }

    /// Asserts that the body is an error response with the given code.
    ///
    /// # Panics
    ///
    /// Panics if the body is not an error body or the code differs.
    pub fn assert_error_code(&self, expected: &str) -> &Self {
        match self.error_body() {
            Ok(body) => assert_eq!(body.code, expected, "unexpected error code"),
            Err(e) => panic!(
                "expected an error body with code {expected}: {e}: {}",
                String::from_utf8_lossy(&self.body)
            ),
        }
        self
    }

    /// Asserts that the body is empty.
    ///
    /// # Panics
    ///
    /// Panics if the body has content.
    pub fn assert_empty_body(&self) -> &Self {
        assert!(
            self.body.is_empty(),
            "expected an empty body, got {}",
            String::from_utf8_lossy(&self.body)
        );
        self
    }
}

impl fmt::Debug for TestResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &String::from_utf8_lossy(&self.body))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;

    fn response(status: StatusCode, body: &'static str) -> TestResponse {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        TestResponse::new(status, headers, Bytes::from_static(body.as_bytes()))
    }

    #[tokio::test]
    async fn test_from_http() {
        let http_response = http::Response::builder()
            .status(StatusCode::CREATED)
            .header("x-custom", "v")
            .body(Full::new(Bytes::from_static(b"{\"id\":1}")))
            .unwrap();
        let response = TestResponse::from_http(http_response).await.unwrap();

        response
            .assert_status(StatusCode::CREATED)
            .assert_header("x-custom", "v");
        assert_eq!(response.json_value().unwrap()["id"], 1);
    }

    #[test]
    fn test_error_body() {
        let response = response(
            StatusCode::NOT_FOUND,
            r#"{"code":"NOT_FOUND","message":"user 1 not found"}"#,
        );
        response.assert_error_code("NOT_FOUND");
        let body = response.error_body().unwrap();
        assert_eq!(body.message, "user 1 not found");
        assert!(body.details.is_none());
    }

    #[test]
    #[should_panic(expected = "expected status")]
    fn test_assert_status_panics() {
        response(StatusCode::OK, "{}").assert_status(StatusCode::CREATED);
    }

    #[test]
    fn test_frames() {
        let response = TestResponse::new(
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::from_static(b"event: tick\ndata: 1\n\ndata: 2\n\n"),
        );
        let frames = response.frames().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event.as_deref(), Some("tick"));
        assert_eq!(frames[1].data.as_deref(), Some("2"));
    }
}
