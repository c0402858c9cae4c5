//! Typed and type-erased endpoints.
//!
//! An [`Endpoint`] binds a frozen [`EndpointSpec`] to a handler with concrete
//! input and output types. Routing tables hold many endpoints with different
//! types, so [`ErasedEndpoint`] hides the types behind a boxed request body.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use daedalus_core::{BoxFuture, EndpointSpec, EndpointSpecBuilder, Handler};
use http_body_util::combinators::BoxBody;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::body::BoxError;
use crate::pipeline::{RequestPipeline, Served};
use crate::request::RoutedRequest;

/// Request body type accepted by erased endpoints.
pub type RequestBody = BoxBody<Bytes, BoxError>;

/// A spec bound to a typed handler.
///
/// # Example
///
/// ```
/// use daedalus_core::{EndpointSpec, NoBody, RequestContext};
/// use daedalus_pipeline::Endpoint;
/// use http::Method;
///
/// async fn health(_ctx: RequestContext, _in: NoBody) -> anyhow::Result<String> {
///     Ok("ok".to_string())
/// }
///
/// let endpoint = Endpoint::bind(EndpointSpec::builder("health", Method::GET, "/health"), health);
/// assert_eq!(endpoint.spec().output().name(), "String");
/// ```
pub struct Endpoint<In, Out> {
    spec: Arc<EndpointSpec>,
    handler: Arc<dyn Handler<In, Out>>,
}

impl<In: 'static, Out: 'static> Endpoint<In, Out> {
    /// Binds a frozen spec to `handler`.
    ///
    /// The handler's `In` and `Out` replace the types the spec declared, so
    /// the body is read and written even if the builder never called
    /// [`EndpointSpecBuilder::io`].
    pub fn new(spec: EndpointSpec, handler: impl Handler<In, Out>) -> Self {
        if !spec.input().is::<In>() || !spec.output().is::<Out>() {
            tracing::debug!(
                endpoint = spec.name(),
                declared_input = spec.input().name(),
                declared_output = spec.output().name(),
                "recording handler types on endpoint spec"
            );
        }
        Self {
            spec: Arc::new(spec.with_io::<In, Out>()),
            handler: Arc::new(handler),
        }
    }

    /// Declares `In` and `Out` on `builder`, freezes it and binds `handler`.
    pub fn bind(builder: EndpointSpecBuilder, handler: impl Handler<In, Out>) -> Self {
        Self::new(builder.io::<In, Out>().build(), handler)
    }
}

impl<In, Out> Endpoint<In, Out> {
    /// The frozen spec.
    #[must_use]
    pub fn spec(&self) -> &EndpointSpec {
        &self.spec
    }

    /// The frozen spec, shared.
    #[must_use]
    pub fn shared_spec(&self) -> Arc<EndpointSpec> {
        Arc::clone(&self.spec)
    }

    pub(crate) fn handler(&self) -> &dyn Handler<In, Out> {
        self.handler.as_ref()
    }
}

impl<In, Out> Clone for Endpoint<In, Out> {
    fn clone(&self) -> Self {
        Self {
            spec: Arc::clone(&self.spec),
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<In, Out> fmt::Debug for Endpoint<In, Out> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.spec.name())
            .field("method", self.spec.method())
            .field("path", &self.spec.path())
            .finish_non_exhaustive()
    }
}

/// An endpoint with its input and output types erased.
pub trait ErasedEndpoint: Send + Sync {
    /// The frozen spec.
    fn spec(&self) -> &EndpointSpec;

    /// Serves one request through `pipeline`.
    fn serve<'a>(
        &'a self,
        pipeline: &'a RequestPipeline,
        request: RoutedRequest<RequestBody>,
    ) -> BoxFuture<'a, Served>;
}

impl<In, Out> ErasedEndpoint for Endpoint<In, Out>
where
    In: DeserializeOwned + Default + Send + 'static,
    Out: Serialize + Send + 'static,
{
    fn spec(&self) -> &EndpointSpec {
        &self.spec
    }

    fn serve<'a>(
        &'a self,
        pipeline: &'a RequestPipeline,
        request: RoutedRequest<RequestBody>,
    ) -> BoxFuture<'a, Served> {
        Box::pin(pipeline.serve(self, request))
    }
}
