//! The streaming pipeline.
//!
//! Runs the same front half as the request pipeline (params, body, decode,
//! validate, identity and access). A failure there is an ordinary error
//! response. Past it, the response is committed as `200 text/event-stream`
//! and the callback runs in its own task, writing through an
//! [`EventStream`]. From then on nothing can change the status: a callback
//! error only ends the stream early and is logged.

use std::convert::Infallible;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use bytes::Bytes;
use daedalus_core::{RequestId, Signal};
use daedalus_pipeline::{BoxError, RequestPipeline, RoutedRequest, REQUEST_ID_HEADER};
use http::header::{HeaderName, HeaderValue, CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use http::HeaderMap;
use http_body::Body;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::body::EventBody;
use crate::config::StreamConfig;
use crate::endpoint::StreamEndpoint;
use crate::error::is_disconnect;
use crate::stream::EventStream;

/// Response type of stream endpoints: an event stream once committed, an
/// ordinary error body otherwise.
pub type StreamResponse = http::Response<UnsyncBoxBody<Bytes, Infallible>>;

/// How a committed stream ended.
#[derive(Debug)]
pub enum StreamEnd {
    /// The callback returned normally.
    Completed {
        /// Events written.
        events: u64,
    },
    /// The client went away or the request was cancelled.
    Disconnected,
    /// The callback failed after the response was committed.
    Failed(anyhow::Error),
}

impl StreamEnd {
    /// Returns `true` for a normal end.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// The outcome of serving one stream request.
#[derive(Debug)]
pub struct StreamServed {
    /// The response to write.
    pub response: StreamResponse,
    /// The running callback, when the stream was committed.
    pub completion: Option<JoinHandle<StreamEnd>>,
}

impl StreamServed {
    /// The response status.
    #[must_use]
    pub fn status(&self) -> http::StatusCode {
        self.response.status()
    }

    /// Returns `true` if the stream was committed and the callback started.
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        self.completion.is_some()
    }

    /// Splits into the response and the callback task.
    #[must_use]
    pub fn into_parts(self) -> (StreamResponse, Option<JoinHandle<StreamEnd>>) {
        (self.response, self.completion)
    }
}

/// Serves stream endpoints.
///
/// # Example
///
/// ```
/// use daedalus_core::{EndpointSpec, NoBody, RequestContext};
/// use daedalus_pipeline::RoutedRequest;
/// use daedalus_sse::{EventStream, StreamEndpoint, StreamPipeline};
/// use http::{Method, StatusCode, Uri};
///
/// # tokio_test::block_on(async {
/// let endpoint = StreamEndpoint::<NoBody, u32>::bind(
///     EndpointSpec::builder("count", Method::GET, "/count"),
///     |_ctx: RequestContext, _in: NoBody, stream: EventStream| async move {
///         for n in 1..=3u32 {
///             stream.send(&n).await?;
///         }
///         anyhow::Ok(())
///     },
/// );
///
/// let request = RoutedRequest::with_bytes(Method::GET, Uri::from_static("/count"), "");
/// let served = StreamPipeline::default().serve(&endpoint, request).await;
/// assert_eq!(served.status(), StatusCode::OK);
///
/// let end = served.completion.unwrap().await.unwrap();
/// assert!(end.is_completed());
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct StreamPipeline {
    pipeline: RequestPipeline,
    config: StreamConfig,
}

impl StreamPipeline {
    /// Creates a stream pipeline sharing `pipeline`'s configuration,
    /// validator and observers.
    #[must_use]
    pub fn new(pipeline: RequestPipeline, config: StreamConfig) -> Self {
        Self { pipeline, config }
    }

    /// The underlying request pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }

    /// The stream configuration.
    #[must_use]
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Serves one stream request.
    ///
    /// Must be called within a Tokio runtime; the callback is spawned.
    pub async fn serve<In, Event, B>(
        &self,
        endpoint: &StreamEndpoint<In, Event>,
        request: RoutedRequest<B>,
    ) -> StreamServed
    where
        In: DeserializeOwned + Default + Send + 'static,
        B: Body,
        B::Error: Into<BoxError>,
    {
        let spec = endpoint.spec();
        let (ctx, input) = match self.pipeline.prepare::<In, B>(spec, request).await {
            Ok(prepared) => prepared.into_parts(),
            Err(response) => {
                return StreamServed {
                    response: response.map(BodyExt::boxed_unsync),
                    completion: None,
                }
            }
        };

        let endpoint_name: Arc<str> = Arc::from(spec.name());
        let request_id = ctx.request_id();
        let cancel = ctx.cancel().clone();
        let disconnected = Arc::new(AtomicBool::new(false));
        let (sender, receiver) = mpsc::channel(self.config.buffer_size.max(1));

        let stream = EventStream::new(sender, Arc::clone(&disconnected), cancel.clone());
        let body = EventBody::new(
            receiver,
            self.config.keep_alive_interval,
            disconnected,
            cancel,
        );
        let response = commit(body, request_id, &self.pipeline.config().default_headers);

        self.pipeline.emit(&endpoint_name, &Signal::StreamOpened);
        self.pipeline
            .emit(&endpoint_name, &Signal::ResponseWritten { status: 200 });
        tracing::debug!(endpoint = %endpoint_name, %request_id, "event stream committed");

        let handler = endpoint.handler();
        let pipeline = self.pipeline.clone();
        let span = tracing::info_span!("stream", endpoint = %endpoint_name, %request_id);
        let completion = tokio::spawn(
            async move {
                let result = handler.call(ctx, input, stream.clone()).await;
                stream.close().await;
                finish(&pipeline, &endpoint_name, &stream, result)
            }
            .instrument(span),
        );

        StreamServed {
            response,
            completion: Some(completion),
        }
    }
}

fn commit(body: EventBody, request_id: RequestId, defaults: &HeaderMap) -> StreamResponse {
    let mut response = http::Response::new(body.boxed_unsync());
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    let existing: Vec<HeaderName> = headers.keys().cloned().collect();
    for (name, value) in defaults {
        if !existing.contains(name) {
            headers.append(name.clone(), value.clone());
        }
    }
    response
}

fn finish(
    pipeline: &RequestPipeline,
    endpoint: &str,
    stream: &EventStream,
    result: anyhow::Result<()>,
) -> StreamEnd {
    let events = stream.events_sent();
    match result {
        Ok(()) => {
            tracing::debug!(endpoint, events, "event stream completed");
            pipeline.emit(endpoint, &Signal::StreamClosed { events });
            StreamEnd::Completed { events }
        }
        Err(error) if is_disconnect(&error) || stream.is_disconnected() => {
            tracing::debug!(endpoint, events, error = %format!("{error:#}"), "client disconnected");
            pipeline.emit(endpoint, &Signal::StreamDisconnected { events });
            StreamEnd::Disconnected
        }
        Err(error) => {
            let reason = format!("{error:#}");
            tracing::error!(endpoint, events, error = %reason, "event stream callback failed");
            pipeline.emit(endpoint, &Signal::StreamFailed { reason });
            StreamEnd::Failed(error)
        }
    }
}
