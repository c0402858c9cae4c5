//! Server-sent event parsing.

use serde::de::DeserializeOwned;

/// One parsed event-stream frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    /// The `event:` name, if any.
    pub event: Option<String>,
    /// `data:` lines joined with `\n`, if any.
    pub data: Option<String>,
    /// The `id:` field, if any.
    pub id: Option<String>,
    /// Comment lines, without the leading `:`.
    pub comments: Vec<String>,
}

impl SseFrame {
    /// Returns `true` for a frame holding only comments, such as keep-alives.
    #[must_use]
    pub fn is_comment(&self) -> bool {
        self.event.is_none() && self.data.is_none() && self.id.is_none()
    }

    /// Decodes the data as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no data or it does not decode.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(self.data.as_deref().unwrap_or_default())
    }
}

/// Splits an event stream into frames.
///
/// Frames end at a blank line; a trailing frame without one is kept.
/// A single space after the field colon is stripped. Unknown fields are
/// ignored.
#[must_use]
pub fn parse_frames(text: &str) -> Vec<SseFrame> {
    let mut frames = Vec::new();
    let mut current = SseFrame::default();
    let mut dirty = false;

    for line in text.lines() {
        if line.is_empty() {
            if dirty {
                frames.push(std::mem::take(&mut current));
                dirty = false;
            }
            continue;
        }
        dirty = true;

        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "" => current.comments.push(value.to_string()),
            "event" => current.event = Some(value.to_string()),
            "id" => current.id = Some(value.to_string()),
            "data" => {
                current.data = Some(match current.data.take() {
                    Some(existing) => format!("{existing}\n{value}"),
                    None => value.to_string(),
                });
            }
            _ => {}
        }
    }

    if dirty {
        frames.push(current);
    }
    frames
}
