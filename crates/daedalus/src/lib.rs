//! # Daedalus
//!
//! **Typed callbacks as documented HTTP endpoints**
//!
//! Daedalus turns a strongly-typed callback into an endpoint that is
//! parameter-extracted, size-bounded, decoded, validated, authorized,
//! rate-limited, invoked and encoded, and derives its OpenAPI description
//! from the same declaration.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use daedalus::prelude::*;
//! use http::{Method, StatusCode};
//!
//! let create = Endpoint::bind(
//!     EndpointSpec::builder("createOrder", Method::POST, "/orders")
//!         .success_status(StatusCode::CREATED)
//!         .error(errors::conflict())
//!         .with_scopes(["orders:write"]),
//!     |_ctx: RequestContext, input: NewOrder| async move { anyhow::Ok(Order::from(input)) },
//! );
//!
//! let config = ConfigLoader::new().with_env_prefix("DAEDALUS").load()?;
//! let pipeline = RequestPipeline::new(config.pipeline_config()?)
//!     .with_observer(TracingObserver::new());
//!
//! let served = pipeline.serve(&create, routed_request).await;
//! ```
//!
//! ## Architecture
//!
//! Routing and transport stay outside; a router hands over a matched
//! request and receives a response.
//!
//! ```text
//! Router → Params → Body → Decode → Validate → Identity → Access → Handler
//!                                                                    ↓
//! Router ← Encode ← Output validation ← Classify ←───────────────────┘
//! ```
//!
//! Streaming endpoints share the front half, then commit a `text/event-stream`
//! response and hand the callback an [`EventStream`](sse::EventStream).

#![doc(html_root_url = "https://docs.rs/daedalus/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use daedalus_core as core;

// Re-export schema synthesis and document assembly
pub use daedalus_schema as schema;

// Re-export access decisions
pub use daedalus_authz as authz;

// Re-export the request pipeline
pub use daedalus_pipeline as pipeline;

// Re-export the streaming pipeline
pub use daedalus_sse as sse;

// Re-export configuration
pub use daedalus_config as config;

// Re-export logging and observation
pub use daedalus_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// ```rust
/// use daedalus::prelude::*;
/// ```
pub mod prelude {
    pub use daedalus_core::{
        errors, CallerIdentity, EndpointSpec, ErrorDefinition, Handler, Identity, NoBody,
        NoIdentity, Observer, RequestContext, RequestId, Signal, ValidationViolation, Validator,
    };

    // Re-export pipeline types
    pub use daedalus_pipeline::{
        Endpoint, ErasedEndpoint, PipelineConfig, PipelineFailure, RequestPipeline, RoutedRequest,
        Served,
    };

    // Re-export SSE types
    pub use daedalus_sse::{
        EventStream, SseError, SseEvent, StreamConfig, StreamEnd, StreamEndpoint, StreamPipeline,
    };

    // Re-export documentation types
    pub use daedalus_schema::{Describe, DocumentBuilder, FieldDescriptor, FieldType, StaticScanner};

    // Re-export configuration and telemetry
    pub use daedalus_config::{ConfigLoader, DaedalusConfig};
    pub use daedalus_telemetry::{init_logging, LogConfig, TracingObserver};
}
