//! Event stream frames.
//!
//! ```text
//! id: 7
//! event: progress
//! data: {"done":3,"total":10}
//!
//! : keepalive
//!
//! ```
//!
//! Every frame ends with a blank line. Multi-line data is split across
//! several `data:` lines, which clients join back with `\n`.

use bytes::Bytes;
use serde::Serialize;

use crate::error::{SseError, SseResult};

/// The keep-alive frame written while a stream is idle.
pub const KEEP_ALIVE_FRAME: &[u8] = b": keepalive\n\n";

/// A data frame.
///
/// # Example
///
/// ```
/// use daedalus_sse::SseEvent;
///
/// let event = SseEvent::new("hello\nworld").event("greeting").id("1");
/// assert_eq!(
///     event.to_sse_string(),
///     "id: 1\nevent: greeting\ndata: hello\ndata: world\n\n"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    id: Option<String>,
    event: Option<String>,
    data: String,
}

impl SseEvent {
    /// Creates an unnamed event with raw data.
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            id: None,
            event: None,
            data: data.into(),
        }
    }

    /// Creates an unnamed event whose data is `value` encoded as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SseError::Serialization`] if `value` does not encode.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> SseResult<Self> {
        Ok(Self::new(serde_json::to_string(value)?))
    }

    /// Sets the event id.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the event name.
    #[must_use]
    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// The event id.
    #[must_use]
    pub fn id_value(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The event name.
    #[must_use]
    pub fn event_type(&self) -> Option<&str> {
        self.event.as_deref()
    }

    /// The raw data.
    #[must_use]
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Checks that single-line fields hold no line breaks.
    ///
    /// # Errors
    ///
    /// Returns [`SseError::InvalidField`] naming the offending field.
    pub fn check(&self) -> SseResult<()> {
        for (field, value) in [("id", &self.id), ("event", &self.event)] {
            if value.as_deref().is_some_and(has_line_break) {
                return Err(SseError::InvalidField(field.to_string()));
            }
        }
        Ok(())
    }

    /// Formats the frame.
    #[must_use]
    pub fn to_sse_string(&self) -> String {
        let mut frame = String::with_capacity(self.data.len() + 32);

        if let Some(id) = &self.id {
            frame.push_str("id: ");
            frame.push_str(id);
            frame.push('\n');
        }
        if let Some(event) = &self.event {
            frame.push_str("event: ");
            frame.push_str(event);
            frame.push('\n');
        }
        if self.data.is_empty() {
            frame.push_str("data:\n");
        }
        for line in self.data.lines() {
            frame.push_str("data: ");
            frame.push_str(line);
            frame.push('\n');
        }
        frame.push('\n');
        frame
    }

    /// Formats the frame as bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.to_sse_string())
    }
}

/// A comment frame, ignored by clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseComment(String);

impl SseComment {
    /// Creates a comment.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// The comment text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.0
    }

    /// Formats the frame. Each line of the text becomes its own `:` line.
    #[must_use]
    pub fn to_sse_string(&self) -> String {
        let mut frame = String::with_capacity(self.0.len() + 4);
        if self.0.is_empty() {
            frame.push_str(":\n");
        }
        for line in self.0.lines() {
            frame.push_str(": ");
            frame.push_str(line);
            frame.push('\n');
        }
        frame.push('\n');
        frame
    }

    /// Formats the frame as bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.to_sse_string())
    }
}

fn has_line_break(value: &str) -> bool {
    value.contains(['\n', '\r'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_event() {
        assert_eq!(SseEvent::new("hi").to_sse_string(), "data: hi\n\n");
    }

    #[test]
    fn test_named_json_event() {
        #[derive(Serialize)]
        struct Progress {
            done: u32,
        }

        let event = SseEvent::json(&Progress { done: 3 }).unwrap().event("progress");
        assert_eq!(
            event.to_sse_string(),
            "event: progress\ndata: {\"done\":3}\n\n"
        );
    }

    #[test]
    fn test_empty_data_still_frames() {
        assert_eq!(SseEvent::new("").to_sse_string(), "data:\n\n");
    }

    #[test]
    fn test_line_breaks_rejected_in_single_line_fields() {
        assert!(SseEvent::new("a\nb").check().is_ok());
        assert!(matches!(
            SseEvent::new("x").event("bad\nname").check(),
            Err(SseError::InvalidField(field)) if field == "event"
        ));
        assert!(SseEvent::new("x").id("1\r").check().is_err());
    }

    #[test]
    fn test_comment() {
        assert_eq!(SseComment::new("ping").to_sse_string(), ": ping\n\n");
        assert_eq!(SseComment::new("a\nb").to_sse_string(), ": a\n: b\n\n");
        assert_eq!(&SseComment::new("keepalive").to_bytes()[..], KEEP_ALIVE_FRAME);
    }
}
