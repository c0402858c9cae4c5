//! The streaming response body.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use daedalus_core::CancelSignal;
use http_body::{Body, Frame, SizeHint};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::event::KEEP_ALIVE_FRAME;

/// Streams queued frames to the client.
///
/// Ends once every [`EventStream`](crate::EventStream) handle is closed or
/// dropped and the queue is drained. While idle it writes a keep-alive
/// comment every configured interval.
///
/// Dropping the body before it ends means the client went away: the
/// request's cancellation signal is triggered and the stream is marked
/// disconnected.
#[derive(Debug)]
pub struct EventBody {
    frames: mpsc::Receiver<Bytes>,
    keep_alive: Option<Interval>,
    disconnected: Arc<AtomicBool>,
    cancel: CancelSignal,
    finished: bool,
}

impl EventBody {
    pub(crate) fn new(
        frames: mpsc::Receiver<Bytes>,
        keep_alive: Option<Duration>,
        disconnected: Arc<AtomicBool>,
        cancel: CancelSignal,
    ) -> Self {
        let keep_alive = keep_alive.filter(|period| !period.is_zero()).map(|period| {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticks
        });
        Self {
            frames,
            keep_alive,
            disconnected,
            cancel,
            finished: false,
        }
    }
}

impl Body for EventBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        if self.finished {
            return Poll::Ready(None);
        }

        match self.frames.poll_recv(cx) {
            Poll::Ready(Some(frame)) => {
                if let Some(ticks) = self.keep_alive.as_mut() {
                    ticks.reset();
                }
                Poll::Ready(Some(Ok(Frame::data(frame))))
            }
            Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => {
                let tick = self
                    .keep_alive
                    .as_mut()
                    .map(|ticks| ticks.poll_tick(cx).is_ready());
                match tick {
                    Some(true) => {
                        Poll::Ready(Some(Ok(Frame::data(Bytes::from_static(KEEP_ALIVE_FRAME)))))
                    }
                    _ => Poll::Pending,
                }
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.finished
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::default()
    }
}

impl Drop for EventBody {
    fn drop(&mut self) {
        if !self.finished {
            self.disconnected.store(true, Ordering::Release);
            self.cancel.trigger();
        }
    }
}
