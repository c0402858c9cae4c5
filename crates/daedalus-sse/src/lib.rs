//! # Daedalus SSE
//!
//! Server-Sent Events endpoints for Daedalus.
//!
//! A stream endpoint shares the request pipeline's front half, then commits
//! a `200 text/event-stream` response and hands its callback an
//! [`EventStream`]:
//!
//! - [`EventStream::send`] / [`EventStream::send_event`] write `data:` frames,
//!   optionally named with `event:`
//! - [`EventStream::send_comment`] writes `: text` frames
//! - [`EventStream::done`] resolves when the client goes away
//!
//! Sends on one stream are serialized by a per-stream lock. Once the client
//! disconnects every send fails with [`SseError::Disconnected`]; callbacks
//! usually just propagate it with `?`, which ends the stream quietly.
//!
//! ## Wire format
//!
//! ```text
//! event: progress
//! data: {"done":3}
//!
//! : keepalive
//!
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus-sse/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod body;
mod config;
mod endpoint;
mod error;
mod event;
mod pipeline;
mod stream;

pub use body::EventBody;
pub use config::{StreamConfig, DEFAULT_BUFFER_SIZE, DEFAULT_KEEP_ALIVE};
pub use endpoint::{StreamEndpoint, StreamHandler};
pub use error::{is_disconnect, SseError, SseResult};
pub use event::{SseComment, SseEvent, KEEP_ALIVE_FRAME};
pub use pipeline::{StreamEnd, StreamPipeline, StreamResponse, StreamServed};
pub use stream::EventStream;
