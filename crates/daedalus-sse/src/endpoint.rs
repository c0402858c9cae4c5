//! Stream callbacks and endpoints.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use daedalus_core::{BoxFuture, EndpointSpec, EndpointSpecBuilder, RequestContext};

use crate::stream::EventStream;

/// A stream callback.
///
/// Receives the request context, the decoded input and the stream to write
/// to. Returning ends the stream.
pub trait StreamHandler<In>: Send + Sync + 'static {
    /// Runs the stream.
    ///
    /// # Errors
    ///
    /// Any error. The response is already committed, so errors only end the
    /// stream and are logged.
    fn call(
        &self,
        ctx: RequestContext,
        input: In,
        stream: EventStream,
    ) -> BoxFuture<'static, anyhow::Result<()>>;
}

impl<F, Fut, In> StreamHandler<In> for F
where
    F: Fn(RequestContext, In, EventStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn call(
        &self,
        ctx: RequestContext,
        input: In,
        stream: EventStream,
    ) -> BoxFuture<'static, anyhow::Result<()>> {
        Box::pin(self(ctx, input, stream))
    }
}

/// A streaming spec bound to a callback.
///
/// `Event` only documents the shape of each event; the callback may send any
/// serializable value.
///
/// # Example
///
/// ```
/// use daedalus_core::{EndpointSpec, NoBody, RequestContext};
/// use daedalus_sse::{EventStream, StreamEndpoint};
/// use http::Method;
///
/// #[derive(serde::Serialize)]
/// struct Tick {
///     n: u32,
/// }
///
/// let endpoint = StreamEndpoint::<NoBody, Tick>::bind(
///     EndpointSpec::builder("ticks", Method::GET, "/ticks"),
///     |_ctx: RequestContext, _in: NoBody, stream: EventStream| async move {
///         for n in 0..3 {
///             stream.send(&Tick { n }).await?;
///         }
///         anyhow::Ok(())
///     },
/// );
/// assert!(endpoint.spec().is_streaming());
/// assert_eq!(endpoint.spec().output().name(), "Tick");
/// ```
pub struct StreamEndpoint<In, Event> {
    spec: Arc<EndpointSpec>,
    handler: Arc<dyn StreamHandler<In>>,
    _event: PhantomData<fn() -> Event>,
}

impl<In: 'static, Event: 'static> StreamEndpoint<In, Event> {
    /// Binds a frozen spec to `handler`.
    ///
    /// The spec is marked streaming and records `In` and `Event`, whatever
    /// the builder declared.
    pub fn new(spec: EndpointSpec, handler: impl StreamHandler<In>) -> Self {
        if !spec.is_streaming() || !spec.input().is::<In>() || !spec.output().is::<Event>() {
            tracing::debug!(
                endpoint = spec.name(),
                streaming = spec.is_streaming(),
                declared_input = spec.input().name(),
                declared_event = spec.output().name(),
                "recording callback types on stream spec"
            );
        }
        Self {
            spec: Arc::new(spec.with_io::<In, Event>().into_streaming()),
            handler: Arc::new(handler),
            _event: PhantomData,
        }
    }

    /// Declares `In` and `Event`, marks `builder` streaming, freezes it and
    /// binds `handler`.
    pub fn bind(builder: EndpointSpecBuilder, handler: impl StreamHandler<In>) -> Self {
        Self::new(builder.io::<In, Event>().streaming().build(), handler)
    }
}

impl<In, Event> StreamEndpoint<In, Event> {
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

    pub(crate) fn handler(&self) -> Arc<dyn StreamHandler<In>> {
        Arc::clone(&self.handler)
    }
}

impl<In, Event> Clone for StreamEndpoint<In, Event> {
    fn clone(&self) -> Self {
        Self {
            spec: Arc::clone(&self.spec),
            handler: Arc::clone(&self.handler),
            _event: PhantomData,
        }
    }
}

impl<In, Event> fmt::Debug for StreamEndpoint<In, Event> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamEndpoint")
            .field("name", &self.spec.name())
            .field("path", &self.spec.path())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daedalus_core::{NoBody, RequestContext};
    use http::Method;

    async fn ticks(_ctx: RequestContext, _in: NoBody, stream: EventStream) -> anyhow::Result<()> {
        stream.send(&1u32).await?;
        Ok(())
    }

    #[test]
    fn test_new_marks_streaming_and_records_types() {
        let endpoint = StreamEndpoint::<NoBody, u32>::new(
            EndpointSpec::builder("ticks", Method::GET, "/ticks").build(),
            ticks,
        );
        assert!(endpoint.spec().is_streaming());
        assert!(endpoint.spec().input().is_no_body());
        assert!(endpoint.spec().output().is::<u32>());
    }
}
