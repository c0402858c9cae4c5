//! The request pipeline.
//!
//! Every request runs the same fixed sequence and stops at the first
//! failure:
//!
//! 1. **Params** - declared path parameters must be present; declared query
//!    parameters are read when present
//! 2. **Body** - read up to the configured limit, unless the input is
//!    [`NoBody`](daedalus_core::NoBody)
//! 3. **Decode** - an empty body leaves the input at its default value
//! 4. **Validate** - the decoded value is checked by the [`Validator`]
//! 5. **Identity and access** - the upstream identity, or anonymous, is
//!    checked against the endpoint's access requirements
//! 6. **Invoke** - the handler runs
//! 7. **Classify** - declared typed errors are written with their own
//!    status; undeclared typed errors and untyped errors become an opaque 500
//! 8. **Output validation** - optional; any violation is a 500
//! 9. **Encode** - the output is written with the success status
//!
//! Steps 1-5 are [`RequestPipeline::prepare`], shared with event streams.
//! Each step reports a [`Signal`] to the configured observers.

use std::sync::Arc;

use daedalus_authz::authorize;
use daedalus_core::{
    errors, find_definition, EndpointSpec, ErrorDefinition, Identity, NoIdentity, NoopValidator,
    Observer, Observers, Params, RequestContext, RequestId, Signal, ValidationViolation,
    Validator,
};
use http_body::Body;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::Instrument;

use crate::body::{read_body, BodyError, BoxError};
use crate::config::PipelineConfig;
use crate::endpoint::Endpoint;
use crate::failure::PipelineFailure;
use crate::request::RoutedRequest;
use crate::response::{Response, ResponseExt};

/// Runs requests through the fixed step sequence.
///
/// # Example
///
/// ```
/// use daedalus_core::{EndpointSpec, RequestContext};
/// use daedalus_pipeline::{Endpoint, PipelineConfig, RequestPipeline, RoutedRequest};
/// use http::{Method, StatusCode, Uri};
///
/// # tokio_test::block_on(async {
/// let endpoint = Endpoint::bind(
///     EndpointSpec::builder("shout", Method::POST, "/shout"),
///     |_ctx: RequestContext, text: String| async move { anyhow::Ok(text.to_uppercase()) },
/// );
///
/// let pipeline = RequestPipeline::new(PipelineConfig::default());
/// let request = RoutedRequest::with_bytes(Method::POST, Uri::from_static("/shout"), "\"hi\"");
///
/// let served = pipeline.serve(&endpoint, request).await;
/// assert_eq!(served.status(), StatusCode::OK);
/// assert!(served.failure.is_none());
/// # });
/// ```
#[derive(Clone)]
pub struct RequestPipeline {
    config: PipelineConfig,
    validator: Arc<dyn Validator>,
    observers: Observers,
}

impl Default for RequestPipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl std::fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("config", &self.config)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

/// The outcome of serving one request.
#[derive(Debug)]
pub struct Served {
    /// The response to write.
    pub response: Response,
    /// Set when the response hides a failure operators should see.
    pub failure: Option<PipelineFailure>,
}

impl Served {
    /// The response status.
    #[must_use]
    pub fn status(&self) -> http::StatusCode {
        self.response.status()
    }

    /// Splits into the response and the failure, if any.
    #[must_use]
    pub fn into_parts(self) -> (Response, Option<PipelineFailure>) {
        (self.response, self.failure)
    }
}

/// A request that passed steps 1-5.
#[derive(Debug)]
pub struct Prepared<In> {
    ctx: RequestContext,
    input: In,
}

impl<In> Prepared<In> {
    /// The context the handler will receive.
    #[must_use]
    pub fn context(&self) -> &RequestContext {
        &self.ctx
    }

    /// The decoded, validated input.
    #[must_use]
    pub fn input(&self) -> &In {
        &self.input
    }

    /// Splits into context and input.
    #[must_use]
    pub fn into_parts(self) -> (RequestContext, In) {
        (self.ctx, self.input)
    }
}

impl RequestPipeline {
    /// Creates a pipeline that accepts every input and has no observers.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            validator: Arc::new(NoopValidator),
            observers: Observers::new(),
        }
    }

    /// Sets the validation engine.
    #[must_use]
    pub fn with_validator(mut self, validator: impl Validator) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Sets a shared validation engine.
    #[must_use]
    pub fn with_shared_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    /// Adds a signal observer.
    #[must_use]
    pub fn with_observer(mut self, observer: impl Observer) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Reports `signal` for `endpoint` to every observer.
    pub fn emit(&self, endpoint: &str, signal: &Signal) {
        self.observers.emit(endpoint, signal);
    }

    /// Builds the response for a pipeline-produced error and reports it.
    #[must_use]
    pub fn reject(&self, endpoint: &str, request_id: RequestId, error: &ErrorDefinition) -> Response {
        let response = Response::from_error(error).with_request_id(request_id);
        self.emit(
            endpoint,
            &Signal::ResponseWritten {
                status: response.status().as_u16(),
            },
        );
        response
    }

    /// Runs steps 1-5: params, body, decode, validate, identity and access.
    ///
    /// # Errors
    ///
    /// Returns the finished error response of the first failing step.
    pub async fn prepare<In, B>(
        &self,
        spec: &EndpointSpec,
        request: RoutedRequest<B>,
    ) -> Result<Prepared<In>, Response>
    where
        In: DeserializeOwned + Default,
        B: Body,
        B::Error: Into<BoxError>,
    {
        let endpoint = spec.name();
        let request_id = self
            .config
            .trust_request_id
            .then(|| request.inbound_request_id())
            .flatten()
            .unwrap_or_else(RequestId::new);
        let query = request.query_pairs();
        let parts = request.into_parts();

        let params = self.bind_params(spec, parts.params, &query, request_id)?;

        let input = if spec.input().is_no_body() {
            In::default()
        } else {
            let bytes = match read_body(parts.body, self.config.body_limit()).await {
                Ok(bytes) => bytes,
                Err(BodyError::TooLarge { limit }) => {
                    self.emit(endpoint, &Signal::BodyTooLarge { limit });
                    let error = errors::payload_too_large().with_details(&LimitDetails { limit });
                    return Err(self.reject(endpoint, request_id, &error));
                }
                Err(e) => {
                    tracing::debug!(endpoint, error = %e, "request body read failed");
                    self.emit(endpoint, &Signal::BodyReadFailed { reason: e.to_string() });
                    let error = errors::bad_request().with_message("request body could not be read");
                    return Err(self.reject(endpoint, request_id, &error));
                }
            };
            self.emit(endpoint, &Signal::BodyRead { bytes: bytes.len() });
            self.decode(spec, &bytes, request_id)?
        };

        let identity: Arc<dyn Identity> = parts.identity.unwrap_or_else(|| Arc::new(NoIdentity));
        self.emit(
            endpoint,
            &Signal::IdentityResolved {
                authenticated: identity.is_authenticated(),
            },
        );

        if let Err(denial) = authorize(spec.access(), identity.as_ref()) {
            tracing::info!(
                endpoint,
                caller = %identity.log_id(),
                reason = %denial,
                "access denied"
            );
            self.emit(
                endpoint,
                &Signal::AccessDenied {
                    status: denial.status().as_u16(),
                    reason: denial.to_string(),
                },
            );
            let mut response = Response::from_error(&denial.to_error()).with_request_id(request_id);
            for (name, value) in denial.headers() {
                response = response.with_header(name, value);
            }
            self.emit(
                endpoint,
                &Signal::ResponseWritten {
                    status: response.status().as_u16(),
                },
            );
            return Err(response);
        }

        let ctx = RequestContext::new(endpoint)
            .with_request_id(request_id)
            .with_params(params)
            .with_identity(identity)
            .with_cancel(parts.cancel.unwrap_or_default());

        Ok(Prepared { ctx, input })
    }

    /// Serves one request end to end.
    pub async fn serve<In, Out, B>(
        &self,
        endpoint: &Endpoint<In, Out>,
        request: RoutedRequest<B>,
    ) -> Served
    where
        In: DeserializeOwned + Default + 'static,
        Out: Serialize + 'static,
        B: Body,
        B::Error: Into<BoxError>,
    {
        let spec = endpoint.spec();
        let (ctx, input) = match self.prepare::<In, B>(spec, request).await {
            Ok(prepared) => prepared.into_parts(),
            Err(response) => {
                return Served {
                    response,
                    failure: None,
                }
            }
        };

        let request_id = ctx.request_id();
        let span = tracing::info_span!("handler", endpoint = spec.name(), %request_id);
        let result = endpoint.handler().call(ctx, input).instrument(span).await;

        let (response, failure) = match result {
            Ok(output) => self.encode(spec, &output),
            Err(error) => self.classify(spec, error),
        };

        let response = response.with_request_id(request_id);
        self.emit(
            spec.name(),
            &Signal::ResponseWritten {
                status: response.status().as_u16(),
            },
        );
        Served { response, failure }
    }

    fn bind_params(
        &self,
        spec: &EndpointSpec,
        matched: Params,
        query: &[(String, String)],
        request_id: RequestId,
    ) -> Result<Params, Response> {
        let endpoint = spec.name();

        if let Some(missing) = spec.path_params().iter().find(|name| !matched.contains(name)) {
            self.emit(endpoint, &Signal::ParamMissing { name: missing.clone() });
            let error = errors::validation_failed(vec![ValidationViolation::new(
                missing.as_str(),
                "required",
                "",
            )])
            .with_message(format!("missing path parameter '{missing}'"));
            return Err(self.reject(endpoint, request_id, &error));
        }

        let mut params = matched;
        for name in spec.query_params() {
            if let Some((_, value)) = query.iter().find(|(key, _)| key == name) {
                params.push(name.as_str(), value.as_str());
            }
        }

        self.emit(endpoint, &Signal::ParamsBound { count: params.len() });
        Ok(params)
    }

    fn decode<In: DeserializeOwned + Default>(
        &self,
        spec: &EndpointSpec,
        bytes: &[u8],
        request_id: RequestId,
    ) -> Result<In, Response> {
        let endpoint = spec.name();

        if bytes.is_empty() {
            self.emit(endpoint, &Signal::DecodeSkipped);
            return Ok(In::default());
        }

        let decoded = serde_json::from_slice::<Value>(bytes)
            .and_then(|value| In::deserialize(&value).map(|input| (input, value)));
        let (input, value) = match decoded {
            Ok(decoded) => decoded,
            Err(e) => {
                self.emit(endpoint, &Signal::DecodeFailed { reason: e.to_string() });
                let error = errors::validation_error()
                    .with_message(format!("request body could not be decoded: {e}"));
                return Err(self.reject(endpoint, request_id, &error));
            }
        };
        self.emit(endpoint, &Signal::Decoded);

        if let Err(violations) = self.validator.validate(spec.input().name(), &value) {
            self.emit(
                endpoint,
                &Signal::ValidationFailed {
                    violations: violations.len(),
                },
            );
            return Err(self.reject(endpoint, request_id, &errors::validation_failed(violations)));
        }
        self.emit(endpoint, &Signal::Validated);

        Ok(input)
    }

    fn classify(
        &self,
        spec: &EndpointSpec,
        error: anyhow::Error,
    ) -> (Response, Option<PipelineFailure>) {
        let endpoint = spec.name();

        match find_definition(&error).cloned() {
            Some(typed) if spec.declares(&typed) => {
                tracing::debug!(endpoint, code = typed.code(), "handler returned declared error");
                self.emit(
                    endpoint,
                    &Signal::DeclaredError {
                        code: typed.code().to_string(),
                        status: typed.status().as_u16(),
                    },
                );
                (Response::from_error(&typed), None)
            }
            Some(typed) => {
                tracing::error!(
                    endpoint,
                    code = typed.code(),
                    "handler returned an error the endpoint does not declare"
                );
                self.emit(
                    endpoint,
                    &Signal::UndeclaredError {
                        code: typed.code().to_string(),
                    },
                );
                let failure = PipelineFailure::UndeclaredError {
                    endpoint: endpoint.to_string(),
                    error: typed,
                };
                (internal_error(), Some(failure))
            }
            None => {
                let reason = format!("{error:#}");
                tracing::error!(endpoint, error = %reason, "handler failed");
                self.emit(endpoint, &Signal::HandlerFailed { reason });
                let failure = PipelineFailure::Handler {
                    endpoint: endpoint.to_string(),
                    source: error,
                };
                (internal_error(), Some(failure))
            }
        }
    }

    fn encode<Out: Serialize>(
        &self,
        spec: &EndpointSpec,
        output: &Out,
    ) -> (Response, Option<PipelineFailure>) {
        let endpoint = spec.name();
        self.emit(endpoint, &Signal::HandlerSucceeded);

        let status = spec.success_status();
        if spec.output().is_no_body() {
            let response = Response::empty(status).with_headers(&self.config.default_headers);
            return (response, None);
        }

        let value = match serde_json::to_value(output) {
            Ok(value) => value,
            Err(e) => return self.encode_failed(endpoint, e),
        };

        if self.config.validate_output {
            if let Err(violations) = self.validator.validate(spec.output().name(), &value) {
                tracing::error!(
                    endpoint,
                    violations = violations.len(),
                    "handler output failed validation"
                );
                self.emit(
                    endpoint,
                    &Signal::OutputValidationFailed {
                        violations: violations.len(),
                    },
                );
                let failure = PipelineFailure::OutputValidation {
                    endpoint: endpoint.to_string(),
                    violations,
                };
                return (internal_error(), Some(failure));
            }
        }

        match serde_json::to_vec(&value) {
            Ok(bytes) => {
                let response = Response::json(status, bytes.into())
                    .with_headers(&self.config.default_headers);
                (response, None)
            }
            Err(e) => self.encode_failed(endpoint, e),
        }
    }

    fn encode_failed(
        &self,
        endpoint: &str,
        error: serde_json::Error,
    ) -> (Response, Option<PipelineFailure>) {
        tracing::error!(endpoint, error = %error, "failed to encode handler output");
        self.emit(endpoint, &Signal::EncodeFailed { reason: error.to_string() });
        let failure = PipelineFailure::Encode {
            endpoint: endpoint.to_string(),
            source: error,
        };
        (internal_error(), Some(failure))
    }
}

fn internal_error() -> Response {
    Response::from_error(&errors::internal_error())
}

/// Details of a 413.
#[derive(Debug, Serialize, Deserialize)]
struct LimitDetails {
    limit: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use daedalus_core::{CallerIdentity, NoBody};
    use http::{Method, StatusCode, Uri};
    use http_body_util::{BodyExt, Full};
    use std::sync::Mutex;

    #[derive(Debug, Default, Deserialize, Serialize)]
    struct Greeting {
        name: String,
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Observer) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observer = move |_endpoint: &str, signal: &Signal| {
            sink.lock().unwrap().push(signal.name().to_string());
        };
        (seen, observer)
    }

    fn post(body: &'static str) -> RoutedRequest<Full<Bytes>> {
        RoutedRequest::with_bytes(Method::POST, Uri::from_static("/greet"), body)
    }

    fn greet_endpoint() -> Endpoint<Greeting, Greeting> {
        Endpoint::bind(
            EndpointSpec::builder("greet", Method::POST, "/greet"),
            |_ctx: RequestContext, input: Greeting| async move {
                anyhow::Ok(Greeting {
                    name: format!("hello {}", input.name),
                })
            },
        )
    }

    async fn json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_success_signals_in_order() {
        let (seen, observer) = recorder();
        let pipeline = RequestPipeline::default().with_observer(observer);

        let served = pipeline.serve(&greet_endpoint(), post(r#"{"name":"ada"}"#)).await;
        assert_eq!(served.status(), StatusCode::OK);
        assert!(served.response.headers().contains_key("x-request-id"));
        assert_eq!(json(served.response).await["name"], "hello ada");

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "params_bound",
                "body_read",
                "decoded",
                "validated",
                "identity_resolved",
                "handler_succeeded",
                "response_written",
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_body_skips_decode_and_validation() {
        let (seen, observer) = recorder();
        let pipeline = RequestPipeline::default()
            .with_validator(|_: &str, _: &Value| -> Result<(), Vec<ValidationViolation>> {
                Err(vec![ValidationViolation::new("name", "required", "")])
            })
            .with_observer(observer);

        let served = pipeline.serve(&greet_endpoint(), post("")).await;
        assert_eq!(served.status(), StatusCode::OK);
        let seen = seen.lock().unwrap();
        assert!(seen.contains(&"decode_skipped".to_string()));
        assert!(!seen.contains(&"validated".to_string()));
    }

    #[tokio::test]
    async fn test_decode_failure_is_422() {
        let pipeline = RequestPipeline::default();
        let served = pipeline.serve(&greet_endpoint(), post("{not json")).await;
        assert_eq!(served.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(served.failure.is_none());
        assert_eq!(json(served.response).await["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_no_body_input_never_reads() {
        let endpoint = Endpoint::bind(
            EndpointSpec::builder("ping", Method::GET, "/ping"),
            |_ctx: RequestContext, _in: NoBody| async { anyhow::Ok(NoBody {}) },
        );
        let pipeline = RequestPipeline::new(PipelineConfig::default().with_max_body_bytes(1));
        let request = RoutedRequest::with_bytes(Method::GET, Uri::from_static("/ping"), "ignored body");

        let served = pipeline.serve(&endpoint, request).await;
        assert_eq!(served.status(), StatusCode::OK);
        let body = served.response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_identity_reaches_handler() {
        let endpoint = Endpoint::bind(
            EndpointSpec::builder("whoami", Method::GET, "/me").require_auth(),
            |ctx: RequestContext, _in: NoBody| async move { anyhow::Ok(ctx.identity().id().to_string()) },
        );
        let request = RoutedRequest::with_bytes(Method::GET, Uri::from_static("/me"), "")
            .with_identity(Arc::new(CallerIdentity::new("user-1")));

        let served = RequestPipeline::default().serve(&endpoint, request).await;
        assert_eq!(served.status(), StatusCode::OK);
        assert_eq!(json(served.response).await, "user-1");
    }

    #[tokio::test]
    async fn test_trusted_request_id_is_reused() {
        let id = RequestId::new();
        let mut headers = http::HeaderMap::new();
        headers.insert("x-request-id", id.to_string().parse().unwrap());

        let pipeline = RequestPipeline::new(PipelineConfig::default().with_trusted_request_id(true));
        let served = pipeline
            .serve(&greet_endpoint(), post("").with_headers(headers.clone()))
            .await;
        assert_eq!(served.response.headers()["x-request-id"], id.to_string().as_str());

        let served = RequestPipeline::default()
            .serve(&greet_endpoint(), post("").with_headers(headers))
            .await;
        assert_ne!(served.response.headers()["x-request-id"], id.to_string().as_str());
    }

    #[tokio::test]
    async fn test_observer_panic_is_contained() {
        let pipeline = RequestPipeline::default()
            .with_observer(|_: &str, _: &Signal| panic!("observer bug"));
        let served = pipeline.serve(&greet_endpoint(), post(r#"{"name":"x"}"#)).await;
        assert_eq!(served.status(), StatusCode::OK);
    }
}
