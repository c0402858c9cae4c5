//! Configuration structures.

use std::collections::BTreeMap;
use std::time::Duration;

use daedalus_pipeline::PipelineConfig;
use daedalus_sse::StreamConfig;
use daedalus_telemetry::logging::create_env_filter;
use daedalus_telemetry::{LogConfig, LogFormat};
use http::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Root configuration.
///
/// Every section is optional in a file; missing sections and fields take
/// their defaults. Unknown fields are rejected.
///
/// # Example
///
/// ```
/// use daedalus_config::DaedalusConfig;
///
/// let config: DaedalusConfig = toml::from_str(r#"
///     [pipeline]
///     max_body_bytes = 4096
///
///     [stream]
///     keep_alive_secs = 0
/// "#).unwrap();
///
/// config.validate().unwrap();
/// assert_eq!(config.pipeline.max_body_bytes, 4096);
/// assert_eq!(config.stream_config().keep_alive_interval, None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaedalusConfig {
    /// Request pipeline settings.
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// Event stream settings.
    #[serde(default)]
    pub stream: StreamSection,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSection,
}

impl DaedalusConfig {
    /// Checks values that deserialize fine but cannot be used.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidValue`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.default_header_map()?;

        if self.stream.buffer_size == 0 {
            return Err(ConfigError::invalid_value(
                "stream.buffer_size",
                "must be at least 1",
            ));
        }

        if self.logging.enabled {
            create_env_filter(&self.logging.level)
                .map_err(|e| ConfigError::invalid_value("logging.level", e.to_string()))?;
        }

        Ok(())
    }

    /// The pipeline section as a [`PipelineConfig`].
    ///
    /// # Errors
    ///
    /// Fails if a default header does not parse.
    pub fn pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
        PipelineConfig::try_from(&self.pipeline)
    }

    /// The stream section as a [`StreamConfig`].
    #[must_use]
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig::from(&self.stream)
    }

    /// The logging section as a [`LogConfig`].
    #[must_use]
    pub fn log_config(&self) -> LogConfig {
        LogConfig::from(&self.logging)
    }

    /// Defaults tuned for local development: pretty debug logs.
    #[must_use]
    pub fn development() -> Self {
        Self {
            logging: LoggingSection {
                level: "debug".to_string(),
                format: LogFormat::Pretty,
                ..LoggingSection::default()
            },
            ..Self::default()
        }
    }

    /// Defaults for production: JSON logs, output validation off.
    #[must_use]
    pub fn production() -> Self {
        Self::default()
    }
}

/// Request pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineSection {
    /// Maximum request body size in bytes. `0` disables the limit.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Validate handler outputs.
    #[serde(default)]
    pub validate_output: bool,

    /// Reuse valid inbound `x-request-id` headers.
    #[serde(default)]
    pub trust_request_id: bool,

    /// Headers added to every successful response.
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            max_body_bytes: default_max_body_bytes(),
            validate_output: false,
            trust_request_id: false,
            default_headers: BTreeMap::new(),
        }
    }
}

impl PipelineSection {
    fn default_header_map(&self) -> Result<Vec<(HeaderName, HeaderValue)>, ConfigError> {
        self.default_headers
            .iter()
            .map(|(name, value)| -> Result<_, ConfigError> {
                let field = format!("pipeline.default_headers.{name}");
                let header = HeaderName::from_bytes(name.as_bytes())
                    .map_err(|e| ConfigError::invalid_value(&field, e.to_string()))?;
                let value = HeaderValue::from_str(value)
                    .map_err(|e| ConfigError::invalid_value(&field, e.to_string()))?;
                Ok((header, value))
            })
            .collect()
    }
}

impl TryFrom<&PipelineSection> for PipelineConfig {
    type Error = ConfigError;

    fn try_from(section: &PipelineSection) -> Result<Self, Self::Error> {
        let config = PipelineConfig::default()
            .with_max_body_bytes(section.max_body_bytes)
            .with_output_validation(section.validate_output)
            .with_trusted_request_id(section.trust_request_id);

        Ok(section
            .default_header_map()?
            .into_iter()
            .fold(config, |config, (name, value)| {
                config.with_default_header(name, value)
            }))
    }
}

/// Event stream settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamSection {
    /// Frames queued between a stream callback and the response body.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Seconds between keep-alive comments. `0` disables them.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

impl From<&StreamSection> for StreamConfig {
    fn from(section: &StreamSection) -> Self {
        let config = StreamConfig::new().with_buffer_size(section.buffer_size);
        if section.keep_alive_secs == 0 {
            config.without_keep_alive()
        } else {
            config.with_keep_alive(Duration::from_secs(section.keep_alive_secs))
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Whether logging is installed at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directives.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `json` or `pretty`.
    #[serde(default)]
    pub format: LogFormat,

    /// Include file and line in log lines.
    #[serde(default)]
    pub file_line_info: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::Json,
            file_line_info: false,
        }
    }
}

impl From<&LoggingSection> for LogConfig {
    fn from(section: &LoggingSection) -> Self {
        Self {
            enabled: section.enabled,
            level: section.level.clone(),
            format: section.format,
            span_events: section.format == LogFormat::Pretty,
            file_line_info: section.file_line_info,
            ..LogConfig::default()
        }
    }
}

fn default_max_body_bytes() -> usize {
    daedalus_pipeline::DEFAULT_MAX_BODY_BYTES
}

fn default_buffer_size() -> usize {
    daedalus_sse::DEFAULT_BUFFER_SIZE
}

fn default_keep_alive_secs() -> u64 {
    daedalus_sse::DEFAULT_KEEP_ALIVE.as_secs()
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_true() -> bool {
    true
}
