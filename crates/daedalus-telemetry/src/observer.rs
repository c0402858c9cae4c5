//! The default signal observer.

use daedalus_core::{Observer, Severity, Signal};
use metrics::{counter, describe_counter};

/// Counter incremented once per emitted signal.
pub const SIGNALS_TOTAL: &str = "daedalus_pipeline_signals_total";

/// Registers metric descriptions with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(SIGNALS_TOTAL, "Pipeline signals by endpoint and signal name");
}

/// Logs every signal through `tracing` and counts it through `metrics`.
///
/// The log level follows [`Signal::severity`]: routine progress is logged at
/// debug, client-caused failures at warn and server-side defects at error.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use daedalus_core::{Observers, Signal};
/// use daedalus_telemetry::TracingObserver;
///
/// let mut observers = Observers::new();
/// observers.push(Arc::new(TracingObserver::new()));
/// observers.emit("getUser", &Signal::Decoded);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TracingObserver {
    count: bool,
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl TracingObserver {
    /// An observer that logs and counts.
    #[must_use]
    pub const fn new() -> Self {
        Self { count: true }
    }

    /// Enables or disables the signal counter.
    #[must_use]
    pub const fn with_metrics(mut self, enabled: bool) -> Self {
        self.count = enabled;
        self
    }
}

impl Observer for TracingObserver {
    fn observe(&self, endpoint: &str, signal: &Signal) {
        let name = signal.name();
        match signal.severity() {
            Severity::Debug => tracing::debug!(endpoint, signal = name, "{signal}"),
            Severity::Info => tracing::info!(endpoint, signal = name, "{signal}"),
            Severity::Warn => tracing::warn!(endpoint, signal = name, "{signal}"),
            Severity::Error => tracing::error!(endpoint, signal = name, "{signal}"),
        }

        if self.count {
            counter!(
                SIGNALS_TOTAL,
                "endpoint" => endpoint.to_string(),
                "signal" => name
            )
            .increment(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics::{
        Counter, CounterFn, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };
    use std::sync::{Arc, Mutex};

    type Hits = Arc<Mutex<Vec<(String, Vec<(String, String)>, u64)>>>;

    #[derive(Default)]
    struct CountingRecorder {
        hits: Hits,
    }

    struct Hit {
        key: Key,
        hits: Hits,
    }

    impl CounterFn for Hit {
        fn increment(&self, value: u64) {
            let labels = self
                .key
                .labels()
                .map(|l| (l.key().to_string(), l.value().to_string()))
                .collect();
            self.hits
                .lock()
                .unwrap()
                .push((self.key.name().to_string(), labels, value));
        }

        fn absolute(&self, _value: u64) {}
    }

    impl Recorder for CountingRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
            Counter::from_arc(Arc::new(Hit {
                key: key.clone(),
                hits: Arc::clone(&self.hits),
            }))
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn test_counts_signals_with_labels() {
        let recorder = CountingRecorder::default();
        metrics::with_local_recorder(&recorder, || {
            describe_metrics();
            let observer = TracingObserver::new();
            observer.observe("createOrder", &Signal::Decoded);
            observer.observe(
                "createOrder",
                &Signal::UndeclaredError {
                    code: "NOT_FOUND".to_string(),
                },
            );
        });

        let hits = recorder.hits.lock().unwrap();
        assert_eq!(hits.len(), 2);
        let (name, labels, value) = &hits[1];
        assert_eq!(name, SIGNALS_TOTAL);
        assert_eq!(*value, 1);
        assert!(labels.contains(&("endpoint".to_string(), "createOrder".to_string())));
        assert!(labels.contains(&("signal".to_string(), "undeclared_error".to_string())));
    }

    #[test]
    fn test_metrics_can_be_disabled() {
        let recorder = CountingRecorder::default();
        metrics::with_local_recorder(&recorder, || {
            TracingObserver::new()
                .with_metrics(false)
                .observe("createOrder", &Signal::StreamOpened);
        });
        assert!(recorder.hits.lock().unwrap().is_empty());
    }

    #[test]
    fn test_observe_without_recorder() {
        TracingObserver::default().observe("getUser", &Signal::ResponseWritten { status: 200 });
    }
}
