//! # Daedalus Pipeline
//!
//! Serves typed endpoints over HTTP requests that a router has already
//! matched.
//!
//! - [`RequestPipeline`] - the fixed step sequence, see [`pipeline`]
//! - [`Endpoint`] - a frozen spec bound to a typed handler
//! - [`ErasedEndpoint`] - the same, with input and output types erased
//! - [`RoutedRequest`] - what the router hands over
//! - [`Served`] - the response plus any failure operators should see

#![doc(html_root_url = "https://docs.rs/daedalus-pipeline/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod body;
mod config;
mod endpoint;
mod failure;
pub mod pipeline;
mod request;
mod response;

pub use body::{read_body, BodyError, BoxError};
pub use config::{PipelineConfig, DEFAULT_MAX_BODY_BYTES};
pub use endpoint::{Endpoint, ErasedEndpoint, RequestBody};
pub use failure::PipelineFailure;
pub use pipeline::{Prepared, RequestPipeline, Served};
pub use request::{RoutedRequest, REQUEST_ID_HEADER};
pub use response::{Response, ResponseExt};
