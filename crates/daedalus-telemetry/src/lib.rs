//! Logging and signal observation for Daedalus.
//!
//! - [`logging::init_logging`] installs a JSON or pretty `tracing` subscriber
//!   filtered by [`EnvFilter`](tracing_subscriber::EnvFilter) directives.
//! - [`TracingObserver`] turns pipeline [`Signal`](daedalus_core::Signal)s into
//!   log events and the `daedalus_pipeline_signals_total` counter.
//!
//! # Example
//!
//! ```rust,ignore
//! use daedalus_pipeline::RequestPipeline;
//! use daedalus_telemetry::{init_logging, LogConfig, TracingObserver};
//!
//! init_logging(&LogConfig::default())?;
//! let pipeline = RequestPipeline::default().with_observer(TracingObserver::new());
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod observer;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogFormat};
pub use observer::{describe_metrics, TracingObserver, SIGNALS_TOTAL};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
