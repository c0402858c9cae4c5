//! Layered configuration for Daedalus.
//!
//! Configuration is resolved in layers, later ones winning:
//!
//! 1. **Defaults** built into [`DaedalusConfig`]
//! 2. **File**: a `.toml` or `.json` document
//! 3. **Environment**: `PREFIX_SECTION_FIELD` variables
//!
//! Each section converts into the runtime type its crate consumes:
//! [`PipelineConfig`](daedalus_pipeline::PipelineConfig),
//! [`StreamConfig`](daedalus_sse::StreamConfig) and
//! [`LogConfig`](daedalus_telemetry::LogConfig).
//!
//! # Example file
//!
//! ```toml
//! [pipeline]
//! max_body_bytes = 1048576
//! validate_output = true
//!
//! [pipeline.default_headers]
//! x-service = "orders"
//!
//! [stream]
//! buffer_size = 64
//! keep_alive_secs = 20
//!
//! [logging]
//! level = "info,daedalus_pipeline=debug"
//! format = "json"
//! ```
//!
//! # Environment overrides
//!
//! | Variable | Field |
//! |----------|-------|
//! | `DAEDALUS_PIPELINE_MAX_BODY_BYTES` | `pipeline.max_body_bytes` |
//! | `DAEDALUS_PIPELINE_VALIDATE_OUTPUT` | `pipeline.validate_output` |
//! | `DAEDALUS_PIPELINE_TRUST_REQUEST_ID` | `pipeline.trust_request_id` |
//! | `DAEDALUS_PIPELINE_DEFAULT_HEADERS` | `pipeline.default_headers` as `name=value,...` |
//! | `DAEDALUS_STREAM_BUFFER_SIZE` | `stream.buffer_size` |
//! | `DAEDALUS_STREAM_KEEP_ALIVE_SECS` | `stream.keep_alive_secs`, `0` or `none` disables |
//! | `DAEDALUS_LOGGING_ENABLED` | `logging.enabled` |
//! | `DAEDALUS_LOGGING_LEVEL` | `logging.level` |
//! | `DAEDALUS_LOGGING_FORMAT` | `logging.format` |
//! | `DAEDALUS_LOGGING_FILE_LINE_INFO` | `logging.file_line_info` |

#![doc(html_root_url = "https://docs.rs/daedalus-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;

pub use config::{DaedalusConfig, LoggingSection, PipelineSection, StreamSection};
pub use error::ConfigError;
pub use loader::ConfigLoader;
