//! Diagnostic signals.
//!
//! The pipelines report what happens at every step as a [`Signal`] delivered
//! to an [`Observers`] list. Delivery is fire-and-forget: observers return
//! nothing and a panicking observer is contained, so diagnostics can never
//! change how a request is served.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// One step outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Signal {
    /// A required path parameter was missing.
    ParamMissing {
        /// Parameter name.
        name: String,
    },
    /// Path and query parameters were bound.
    ParamsBound {
        /// Number of bound parameters.
        count: usize,
    },
    /// The request body was read.
    BodyRead {
        /// Body length in bytes.
        bytes: usize,
    },
    /// The request body exceeded the configured limit.
    BodyTooLarge {
        /// Configured limit in bytes.
        limit: usize,
    },
    /// Reading the request body failed.
    BodyReadFailed {
        /// Underlying error text.
        reason: String,
    },
    /// The body was empty or absent; the input kept its default value.
    DecodeSkipped,
    /// The body decoded into the input type.
    Decoded,
    /// The body could not be decoded.
    DecodeFailed {
        /// Decoder error text.
        reason: String,
    },
    /// Input validation passed.
    Validated,
    /// Input validation reported violations.
    ValidationFailed {
        /// Number of violations.
        violations: usize,
    },
    /// The caller's identity was resolved.
    IdentityResolved {
        /// Whether the caller is authenticated.
        authenticated: bool,
    },
    /// Authorization denied the caller.
    AccessDenied {
        /// Response status.
        status: u16,
        /// Denial reason.
        reason: String,
    },
    /// The handler returned successfully.
    HandlerSucceeded,
    /// The handler returned a declared typed error.
    DeclaredError {
        /// Error code.
        code: String,
        /// Response status.
        status: u16,
    },
    /// The handler returned a typed error the endpoint did not declare.
    UndeclaredError {
        /// Error code.
        code: String,
    },
    /// The handler returned an opaque error.
    HandlerFailed {
        /// Error text, for internal use only.
        reason: String,
    },
    /// Output validation reported violations.
    OutputValidationFailed {
        /// Number of violations.
        violations: usize,
    },
    /// The output could not be encoded.
    EncodeFailed {
        /// Encoder error text.
        reason: String,
    },
    /// A response was written.
    ResponseWritten {
        /// Response status.
        status: u16,
    },
    /// An event stream was committed.
    StreamOpened,
    /// An event stream ended normally.
    StreamClosed {
        /// Events delivered.
        events: u64,
    },
    /// The client went away during a stream.
    StreamDisconnected {
        /// Events delivered before the disconnect.
        events: u64,
    },
    /// A stream callback failed after commit.
    StreamFailed {
        /// Error text, for internal use only.
        reason: String,
    },
}

/// How loudly a signal should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Routine progress.
    Debug,
    /// Notable but expected.
    Info,
    /// Client-caused failure.
    Warn,
    /// Server-side defect.
    Error,
}

impl Signal {
    /// Stable snake_case name, suitable as a metric label.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ParamMissing { .. } => "param_missing",
            Self::ParamsBound { .. } => "params_bound",
            Self::BodyRead { .. } => "body_read",
            Self::BodyTooLarge { .. } => "body_too_large",
            Self::BodyReadFailed { .. } => "body_read_failed",
            Self::DecodeSkipped => "decode_skipped",
            Self::Decoded => "decoded",
            Self::DecodeFailed { .. } => "decode_failed",
            Self::Validated => "validated",
            Self::ValidationFailed { .. } => "validation_failed",
            Self::IdentityResolved { .. } => "identity_resolved",
            Self::AccessDenied { .. } => "access_denied",
            Self::HandlerSucceeded => "handler_succeeded",
            Self::DeclaredError { .. } => "declared_error",
            Self::UndeclaredError { .. } => "undeclared_error",
            Self::HandlerFailed { .. } => "handler_failed",
            Self::OutputValidationFailed { .. } => "output_validation_failed",
            Self::EncodeFailed { .. } => "encode_failed",
            Self::ResponseWritten { .. } => "response_written",
            Self::StreamOpened => "stream_opened",
            Self::StreamClosed { .. } => "stream_closed",
            Self::StreamDisconnected { .. } => "stream_disconnected",
            Self::StreamFailed { .. } => "stream_failed",
        }
    }

    /// Reporting severity.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::ParamMissing { .. }
            | Self::BodyTooLarge { .. }
            | Self::BodyReadFailed { .. }
            | Self::DecodeFailed { .. }
            | Self::ValidationFailed { .. }
            | Self::AccessDenied { .. } => Severity::Warn,
            Self::UndeclaredError { .. }
            | Self::HandlerFailed { .. }
            | Self::OutputValidationFailed { .. }
            | Self::EncodeFailed { .. }
            | Self::StreamFailed { .. } => Severity::Error,
            Self::DeclaredError { .. }
            | Self::StreamOpened
            | Self::StreamClosed { .. }
            | Self::StreamDisconnected { .. }
            | Self::ResponseWritten { .. } => Severity::Info,
            _ => Severity::Debug,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParamMissing { name } => write!(f, "missing path parameter `{name}`"),
            Self::BodyTooLarge { limit } => write!(f, "body exceeds {limit} bytes"),
            Self::BodyReadFailed { reason }
            | Self::DecodeFailed { reason }
            | Self::HandlerFailed { reason }
            | Self::EncodeFailed { reason }
            | Self::StreamFailed { reason } => write!(f, "{}: {reason}", self.name()),
            Self::DeclaredError { code, status } => write!(f, "declared error {code} ({status})"),
            Self::UndeclaredError { code } => write!(f, "undeclared error {code}"),
            Self::AccessDenied { status, reason } => write!(f, "access denied ({status}): {reason}"),
            _ => f.write_str(self.name()),
        }
    }
}

/// Receives signals. Must not block.
pub trait Observer: Send + Sync + 'static {
    /// Called once per signal.
    fn observe(&self, endpoint: &str, signal: &Signal);
}

impl<F> Observer for F
where
    F: Fn(&str, &Signal) + Send + Sync + 'static,
{
    fn observe(&self, endpoint: &str, signal: &Signal) {
        self(endpoint, signal);
    }
}

/// An ordered list of observers.
#[derive(Clone, Default)]
pub struct Observers {
    inner: Vec<Arc<dyn Observer>>,
}

impl Observers {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an observer.
    pub fn push(&mut self, observer: Arc<dyn Observer>) {
        self.inner.push(observer);
    }

    /// Number of observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if there are none.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Delivers `signal` to every observer, containing panics.
    pub fn emit(&self, endpoint: &str, signal: &Signal) {
        for observer in &self.inner {
            let delivered = catch_unwind(AssertUnwindSafe(|| observer.observe(endpoint, signal)));
            if delivered.is_err() {
                tracing::warn!(endpoint, signal = signal.name(), "observer panicked");
            }
        }
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("len", &self.inner.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_emit_reaches_every_observer() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut observers = Observers::new();
        for _ in 0..2 {
            let seen = Arc::clone(&seen);
            observers.push(Arc::new(move |endpoint: &str, signal: &Signal| {
                seen.lock().unwrap().push(format!("{endpoint}:{}", signal.name()));
            }));
        }

        observers.emit("getUser", &Signal::Decoded);
        assert_eq!(*seen.lock().unwrap(), vec!["getUser:decoded", "getUser:decoded"]);
    }

    #[test]
    fn test_panicking_observer_is_contained() {
        let reached = Arc::new(Mutex::new(false));
        let mut observers = Observers::new();
        observers.push(Arc::new(|_: &str, _: &Signal| panic!("boom")));
        let flag = Arc::clone(&reached);
        observers.push(Arc::new(move |_: &str, _: &Signal| {
            *flag.lock().unwrap() = true;
        }));

        observers.emit("x", &Signal::HandlerSucceeded);
        assert!(*reached.lock().unwrap());
    }

    #[test]
    fn test_severity() {
        assert_eq!(Signal::Decoded.severity(), Severity::Debug);
        assert_eq!(
            Signal::UndeclaredError { code: "X".into() }.severity(),
            Severity::Error
        );
        assert_eq!(Signal::ParamMissing { name: "id".into() }.severity(), Severity::Warn);
    }
}
