//! # Daedalus Test
//!
//! In-memory test utilities for Daedalus endpoints. Requests are built
//! already routed and served straight through a pipeline; no sockets, no
//! ports.
//!
//! ## Example
//!
//! ```
//! use daedalus_core::{EndpointSpec, RequestContext};
//! use daedalus_pipeline::{Endpoint, RequestPipeline};
//! use daedalus_test::{TestRequest, TestResponse};
//! use http::{Method, StatusCode};
//!
//! # tokio_test::block_on(async {
//! let endpoint = Endpoint::bind(
//!     EndpointSpec::builder("echo", Method::POST, "/echo"),
//!     |_ctx: RequestContext, body: serde_json::Value| async move { anyhow::Ok(body) },
//! );
//!
//! let request = TestRequest::post("/echo")
//!     .json(&serde_json::json!({"hello": "world"}))
//!     .build()
//!     .unwrap();
//! let served = RequestPipeline::default().serve(&endpoint, request).await;
//!
//! let response = TestResponse::from_http(served.response).await.unwrap();
//! response.assert_status(StatusCode::OK);
//! assert_eq!(response.json_value().unwrap()["hello"], "world");
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod request;
mod response;
mod sse;

pub use error::TestError;
pub use request::{TestRequest, TestRequestBuilder};
pub use response::TestResponse;
pub use sse::{parse_frames, SseFrame};
