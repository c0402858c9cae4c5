//! Request cancellation.
//!
//! Every request carries a [`CancelSignal`]. The streaming pipeline triggers
//! it when the client goes away; handlers can poll or await it to stop work
//! early.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// A cloneable, idempotent cancellation flag.
///
/// All clones observe the same state.
///
/// # Example
///
/// ```
/// use daedalus_core::CancelSignal;
///
/// let cancel = CancelSignal::new();
/// let observer = cancel.clone();
///
/// cancel.trigger();
/// assert!(observer.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancelSignal {
    triggered: Arc<AtomicBool>,
    sender: broadcast::Sender<()>,
}

impl CancelSignal {
    /// Creates an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            triggered: Arc::new(AtomicBool::new(false)),
            sender,
        }
    }

    /// Cancels the request. Repeated calls are no-ops.
    pub fn trigger(&self) {
        if self
            .triggered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            // No receivers is fine.
            let _ = self.sender.send(());
        }
    }

    /// Returns `true` once [`trigger`](Self::trigger) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Returns a future resolving when the signal is triggered.
    ///
    /// Resolves immediately if it already was. The future owns its state and
    /// can be moved into spawned tasks. If every handle is dropped without a
    /// trigger it never resolves.
    pub fn cancelled(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut receiver = self.sender.subscribe();
        let triggered = Arc::clone(&self.triggered);
        async move {
            if triggered.load(Ordering::SeqCst) {
                return;
            }
            if let Err(broadcast::error::RecvError::Closed) = receiver.recv().await {
                // Every signal handle is gone, so nothing can trigger anymore.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}
