//! The event emission capability handed to stream callbacks.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use daedalus_core::CancelSignal;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};

use crate::error::{SseError, SseResult};
use crate::event::{SseComment, SseEvent};

/// Writes frames to one client.
///
/// Every send holds the stream's lock for the whole check-encode-write
/// sequence, so frames from concurrent senders never interleave. Once a
/// write fails the stream is disconnected for good: every later send
/// returns [`SseError::Disconnected`] without writing.
///
/// Clones share the same stream.
#[derive(Debug, Clone)]
pub struct EventStream {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    writer: Mutex<Option<mpsc::Sender<Bytes>>>,
    disconnected: Arc<AtomicBool>,
    events: AtomicU64,
    cancel: CancelSignal,
}

impl EventStream {
    /// Creates a stream writing into `sender`.
    ///
    /// `disconnected` is shared with the reading side, which sets it when the
    /// client goes away.
    pub(crate) fn new(
        sender: mpsc::Sender<Bytes>,
        disconnected: Arc<AtomicBool>,
        cancel: CancelSignal,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                writer: Mutex::new(Some(sender)),
                disconnected,
                events: AtomicU64::new(0),
                cancel,
            }),
        }
    }

    /// Creates a stream and the receiving end of its frames.
    ///
    /// Useful for driving a stream callback without an HTTP response.
    #[must_use]
    pub fn channel(buffer_size: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        let stream = Self::new(sender, Arc::new(AtomicBool::new(false)), CancelSignal::new());
        (stream, receiver)
    }

    /// Sends `data` as an unnamed JSON event.
    ///
    /// # Errors
    ///
    /// [`SseError::Disconnected`] once the client is gone,
    /// [`SseError::Serialization`] if `data` does not encode.
    pub async fn send<T: Serialize + ?Sized>(&self, data: &T) -> SseResult<()> {
        self.write_event(None, data).await
    }

    /// Sends `data` as a JSON event named `name`.
    ///
    /// # Errors
    ///
    /// As [`send`](Self::send), plus [`SseError::InvalidField`] if `name`
    /// contains a line break.
    pub async fn send_event<T: Serialize + ?Sized>(&self, name: &str, data: &T) -> SseResult<()> {
        self.write_event(Some(name), data).await
    }

    /// Sends a fully built frame.
    ///
    /// # Errors
    ///
    /// [`SseError::Disconnected`] once the client is gone,
    /// [`SseError::InvalidField`] for a malformed id or name.
    pub async fn send_frame(&self, event: SseEvent) -> SseResult<()> {
        let mut writer = self.shared.writer.lock().await;
        self.ensure_connected(writer.as_ref())?;
        event.check()?;
        self.write(&mut writer, event.to_bytes()).await?;
        self.shared.events.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Sends a `: text` comment frame.
    ///
    /// Comments do not count as events.
    ///
    /// # Errors
    ///
    /// [`SseError::Disconnected`] once the client is gone.
    pub async fn send_comment(&self, text: &str) -> SseResult<()> {
        let mut writer = self.shared.writer.lock().await;
        self.ensure_connected(writer.as_ref())?;
        self.write(&mut writer, SseComment::new(text).to_bytes()).await
    }

    /// Resolves when the request is cancelled, typically because the client
    /// disconnected. Select on it during long waits between sends.
    pub fn done(&self) -> impl Future<Output = ()> + Send + 'static {
        self.shared.cancel.cancelled()
    }

    /// Returns `true` once nothing more can be written.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.shared.disconnected.load(Ordering::Acquire) || self.shared.cancel.is_cancelled()
    }

    /// Number of events written so far.
    #[must_use]
    pub fn events_sent(&self) -> u64 {
        self.shared.events.load(Ordering::Relaxed)
    }

    /// Ends the stream for every clone. The client sees the response end
    /// once queued frames are drained.
    pub async fn close(&self) {
        self.shared.writer.lock().await.take();
    }

    async fn write_event<T: Serialize + ?Sized>(&self, name: Option<&str>, data: &T) -> SseResult<()> {
        let mut writer = self.shared.writer.lock().await;
        self.ensure_connected(writer.as_ref())?;

        let mut event = SseEvent::json(data)?;
        if let Some(name) = name {
            event = event.event(name);
        }
        event.check()?;

        self.write(&mut writer, event.to_bytes()).await?;
        self.shared.events.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn ensure_connected(&self, writer: Option<&mpsc::Sender<Bytes>>) -> SseResult<()> {
        match writer {
            Some(sender) if !self.is_disconnected() && !sender.is_closed() => Ok(()),
            _ => Err(self.mark_disconnected()),
        }
    }

    async fn write(&self, writer: &mut Option<mpsc::Sender<Bytes>>, frame: Bytes) -> SseResult<()> {
        let Some(sender) = writer.as_ref() else {
            return Err(self.mark_disconnected());
        };
        if sender.send(frame).await.is_err() {
            writer.take();
            return Err(self.mark_disconnected());
        }
        Ok(())
    }

    fn mark_disconnected(&self) -> SseError {
        self.shared.disconnected.store(true, Ordering::Release);
        SseError::Disconnected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(frame: &Bytes) -> &str {
        std::str::from_utf8(frame).unwrap()
    }

    #[tokio::test]
    async fn test_send_writes_frames() {
        let (stream, mut frames) = EventStream::channel(8);

        stream.send(&serde_json::json!({"n": 1})).await.unwrap();
        stream.send_event("tick", &2).await.unwrap();
        stream.send_comment("still here").await.unwrap();

        assert_eq!(text(&frames.recv().await.unwrap()), "data: {\"n\":1}\n\n");
        assert_eq!(text(&frames.recv().await.unwrap()), "event: tick\ndata: 2\n\n");
        assert_eq!(text(&frames.recv().await.unwrap()), ": still here\n\n");
        assert_eq!(stream.events_sent(), 2);
    }

    #[tokio::test]
    async fn test_disconnect_is_sticky() {
        let (stream, frames) = EventStream::channel(8);
        drop(frames);

        assert!(matches!(stream.send(&1).await, Err(SseError::Disconnected)));
        assert!(stream.is_disconnected());
        assert!(matches!(
            stream.send_comment("x").await,
            Err(SseError::Disconnected)
        ));
        assert_eq!(stream.events_sent(), 0);
    }

    #[tokio::test]
    async fn test_invalid_name_writes_nothing() {
        let (stream, mut frames) = EventStream::channel(8);

        let err = stream.send_event("two\nlines", &1).await.unwrap_err();
        assert!(matches!(err, SseError::InvalidField(_)));
        assert!(!stream.is_disconnected());

        stream.close().await;
        assert!(frames.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_close_ends_every_clone() {
        let (stream, mut frames) = EventStream::channel(8);
        let clone = stream.clone();

        stream.send(&"a").await.unwrap();
        stream.close().await;

        assert!(clone.send(&"b").await.is_err());
        assert_eq!(text(&frames.recv().await.unwrap()), "data: \"a\"\n\n");
        assert!(frames.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_sends_do_not_interleave() {
        let (stream, mut frames) = EventStream::channel(64);

        let mut tasks = Vec::new();
        for worker in 0..4 {
            let stream = stream.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..8 {
                    stream
                        .send_event("item", &serde_json::json!({"worker": worker, "i": i}))
                        .await
                        .unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        stream.close().await;

        let mut count = 0;
        while let Some(frame) = frames.recv().await {
            let frame = text(&frame);
            assert!(frame.starts_with("event: item\ndata: {"));
            assert!(frame.ends_with("}\n\n"));
            count += 1;
        }
        assert_eq!(count, 32);
        assert_eq!(stream.events_sent(), 32);
    }

    #[tokio::test]
    async fn test_done_follows_cancellation() {
        let (sender, _frames) = mpsc::channel(1);
        let cancel = CancelSignal::new();
        let stream = EventStream::new(sender, Arc::new(AtomicBool::new(false)), cancel.clone());

        let done = tokio::spawn(stream.done());
        cancel.trigger();
        done.await.unwrap();
        assert!(stream.is_disconnected());
        assert!(stream.send(&1).await.is_err());
    }
}
