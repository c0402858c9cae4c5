//! Error types for event stream operations.

use thiserror::Error;

/// Result type for stream operations.
pub type SseResult<T> = Result<T, SseError>;

/// Errors returned by [`EventStream`](crate::EventStream) sends.
#[derive(Debug, Error)]
pub enum SseError {
    /// The client is gone or the stream was closed. No further frame will
    /// ever be written.
    #[error("stream disconnected")]
    Disconnected,

    /// Event data could not be encoded as JSON.
    #[error("failed to encode event data: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An event name or id contained a line break.
    #[error("invalid event field: {0}")]
    InvalidField(String),
}

impl SseError {
    /// Returns `true` if this error means the client went away.
    #[must_use]
    pub const fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

/// Returns `true` if `error` has a disconnect anywhere in its chain.
///
/// Stream callbacks usually bubble send errors up with `?`, possibly adding
/// context on the way; this looks through it.
#[must_use]
pub fn is_disconnect(error: &anyhow::Error) -> bool {
    error
        .chain()
        .filter_map(|cause| cause.downcast_ref::<SseError>())
        .any(SseError::is_disconnect)
}
