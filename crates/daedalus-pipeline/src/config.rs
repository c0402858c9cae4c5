//! Pipeline configuration.

use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;

/// Default request body limit: 10 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Settings shared by every request a pipeline serves.
///
/// # Example
///
/// ```
/// use daedalus_pipeline::PipelineConfig;
/// use http::header::{HeaderName, HeaderValue};
///
/// let config = PipelineConfig::default()
///     .with_max_body_bytes(1024)
///     .with_output_validation(true)
///     .with_default_header(
///         HeaderName::from_static("x-service"),
///         HeaderValue::from_static("orders"),
///     );
///
/// assert_eq!(config.max_body_bytes, 1024);
/// assert!(config.validate_output);
/// assert_eq!(config.default_headers.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum request body size in bytes. `0` disables the limit.
    pub max_body_bytes: usize,

    /// Validate handler outputs before encoding them.
    ///
    /// A violation is a handler bug and always yields a 500.
    pub validate_output: bool,

    /// Headers added to every successful response.
    pub default_headers: HeaderMap,

    /// Reuse a valid inbound `x-request-id` instead of generating one.
    ///
    /// Only enable this behind a trusted proxy.
    pub trust_request_id: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            validate_output: false,
            default_headers: HeaderMap::new(),
            trust_request_id: false,
        }
    }
}

impl PipelineConfig {
    /// Sets the body limit; `0` disables it.
    #[must_use]
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Enables or disables output validation.
    #[must_use]
    pub fn with_output_validation(mut self, enabled: bool) -> Self {
        self.validate_output = enabled;
        self
    }

    /// Adds a default response header.
    #[must_use]
    pub fn with_default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.append(name, value);
        self
    }

    /// Trusts inbound request ids.
    #[must_use]
    pub fn with_trusted_request_id(mut self, trust: bool) -> Self {
        self.trust_request_id = trust;
        self
    }

    /// The body limit, or `None` when unlimited.
    #[must_use]
    pub fn body_limit(&self) -> Option<usize> {
        (self.max_body_bytes > 0).then_some(self.max_body_bytes)
    }
}
