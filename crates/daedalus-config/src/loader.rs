//! Layered configuration loading.

use std::env;
use std::fs;
use std::path::Path;

use daedalus_telemetry::LogFormat;

use crate::{ConfigError, DaedalusConfig};

/// Builds a [`DaedalusConfig`] from layered sources.
///
/// Later layers override earlier ones:
/// 1. Default values
/// 2. A configuration file (TOML or JSON, chosen by extension)
/// 3. Environment variables named `PREFIX_SECTION_FIELD`
///
/// A file replaces the defaults as a whole document; fields it leaves out
/// take their defaults again.
///
/// # Example
///
/// ```no_run
/// use daedalus_config::ConfigLoader;
///
/// # fn main() -> Result<(), daedalus_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_optional_file("daedalus.toml")?
///     .with_env_prefix("DAEDALUS")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: DaedalusConfig,
    env_prefix: Option<String>,
    env_vars: Option<Vec<(String, String)>>,
}

impl ConfigLoader {
    /// A loader holding the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets to default values.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = DaedalusConfig::default();
        self
    }

    /// Starts from [`DaedalusConfig::development`].
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = DaedalusConfig::development();
        self
    }

    /// Starts from [`DaedalusConfig::production`].
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = DaedalusConfig::production();
        self
    }

    /// Loads a `.toml` or `.json` file.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing, unreadable, has another extension or
    /// does not parse.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        self.config = Self::parse_file(&content, path)?;
        Ok(self)
    }

    /// Loads a file if it exists.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Loads configuration from a string in the named format.
    ///
    /// # Errors
    ///
    /// Fails for formats other than `toml` and `json`, or on parse errors.
    ///
    /// # Example
    ///
    /// ```
    /// use daedalus_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[pipeline]\nvalidate_output = true\n", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert!(config.pipeline.validate_output);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => return Err(ConfigError::UnsupportedFormat(format.to_string())),
        };
        Ok(self)
    }

    /// Enables environment overrides under `prefix`.
    ///
    /// With prefix `DAEDALUS`, `DAEDALUS_STREAM_BUFFER_SIZE=64` sets
    /// `stream.buffer_size`. Variables under the prefix that name no field
    /// are ignored.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Reads overrides from `vars` instead of the process environment.
    #[must_use]
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_vars = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Applies environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Fails if an override does not parse or validation fails.
    pub fn load(mut self) -> Result<DaedalusConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let vars = self.env_vars.take().unwrap_or_else(|| env::vars().collect());
            self.apply_env_overrides(&prefix, vars)?;
        }

        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the configuration without environment overrides or
    /// validation.
    #[must_use]
    pub fn load_unvalidated(self) -> DaedalusConfig {
        self.config
    }

    fn parse_file(content: &str, path: &Path) -> Result<DaedalusConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    fn apply_env_overrides(
        &mut self,
        prefix: &str,
        vars: Vec<(String, String)>,
    ) -> Result<(), ConfigError> {
        let prefix = format!("{prefix}_");
        let mut overrides: Vec<(String, String)> = vars
            .into_iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .collect();
        overrides.sort();

        for (key, value) in overrides {
            self.apply_env_var(&key, &key[prefix.len()..], &value)?;
        }
        Ok(())
    }

    fn apply_env_var(&mut self, var: &str, key: &str, value: &str) -> Result<(), ConfigError> {
        let pipeline = &mut self.config.pipeline;
        let stream = &mut self.config.stream;
        let logging = &mut self.config.logging;

        match key {
            "PIPELINE_MAX_BODY_BYTES" => pipeline.max_body_bytes = parse_number(var, value)?,
            "PIPELINE_VALIDATE_OUTPUT" => pipeline.validate_output = parse_flag(var, value)?,
            "PIPELINE_TRUST_REQUEST_ID" => pipeline.trust_request_id = parse_flag(var, value)?,
            "PIPELINE_DEFAULT_HEADERS" => {
                pipeline.default_headers = parse_header_list(var, value)?;
            }

            "STREAM_BUFFER_SIZE" => stream.buffer_size = parse_number(var, value)?,
            "STREAM_KEEP_ALIVE_SECS" => {
                stream.keep_alive_secs = if value.eq_ignore_ascii_case("none") {
                    0
                } else {
                    parse_number(var, value)?
                };
            }

            "LOGGING_ENABLED" => logging.enabled = parse_flag(var, value)?,
            "LOGGING_LEVEL" => logging.level = value.to_string(),
            "LOGGING_FORMAT" => {
                logging.format = value.parse::<LogFormat>().map_err(|_| {
                    ConfigError::env_parse_error(var, "expected 'json' or 'pretty'")
                })?;
            }
            "LOGGING_FILE_LINE_INFO" => logging.file_line_info = parse_flag(var, value)?,

            _ => {}
        }

        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(var, "expected integer"))
}

fn parse_flag(var: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(var, "expected boolean"))
}

/// `name=value` pairs separated by commas.
fn parse_header_list(
    var: &str,
    value: &str,
) -> Result<std::collections::BTreeMap<String, String>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            pair.split_once('=')
                .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
                .ok_or_else(|| ConfigError::env_parse_error(var, "expected name=value pairs"))
        })
        .collect()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_new() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config, DaedalusConfig::default());
    }

    #[test]
    fn test_loader_with_development() {
        let config = ConfigLoader::new().with_development().load().unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_loader_with_string_json() {
        let json = r#"{"stream": {"buffer_size": 4, "keep_alive_secs": 0}}"#;
        let config = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.stream.buffer_size, 4);
        assert_eq!(config.stream_config().keep_alive_interval, None);
    }

    #[test]
    fn test_loader_unsupported_format() {
        let err = ConfigLoader::new().with_string("a: 1", "yaml").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(ref f) if f == "yaml"));
    }

    #[test]
    fn test_loader_with_file_not_found() {
        let err = ConfigLoader::new()
            .with_file("/nonexistent/daedalus.toml")
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_loader_with_optional_file_not_found() {
        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/daedalus.toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config, DaedalusConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let config = ConfigLoader::new()
            .with_env_prefix("daedalus")
            .with_env_vars([
                ("DAEDALUS_PIPELINE_MAX_BODY_BYTES", "2048"),
                ("DAEDALUS_PIPELINE_VALIDATE_OUTPUT", "yes"),
                ("DAEDALUS_PIPELINE_DEFAULT_HEADERS", "x-service=orders, x-region=eu"),
                ("DAEDALUS_STREAM_KEEP_ALIVE_SECS", "none"),
                ("DAEDALUS_LOGGING_FORMAT", "pretty"),
                ("DAEDALUS_UNRELATED", "ignored"),
                ("OTHER_STREAM_BUFFER_SIZE", "1"),
            ])
            .load()
            .unwrap();

        assert_eq!(config.pipeline.max_body_bytes, 2048);
        assert!(config.pipeline.validate_output);
        assert_eq!(config.pipeline.default_headers["x-service"], "orders");
        assert_eq!(config.pipeline.default_headers["x-region"], "eu");
        assert_eq!(config.stream.keep_alive_secs, 0);
        assert_eq!(config.stream.buffer_size, 32);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_env_vars_ignored_without_prefix() {
        let config = ConfigLoader::new()
            .with_env_vars([("DAEDALUS_STREAM_BUFFER_SIZE", "1")])
            .load()
            .unwrap();
        assert_eq!(config.stream.buffer_size, 32);
    }

    #[test]
    fn test_env_parse_errors() {
        let err = ConfigLoader::new()
            .with_env_prefix("DAEDALUS")
            .with_env_vars([("DAEDALUS_STREAM_BUFFER_SIZE", "many")])
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::EnvParseError { ref var, .. } if var == "DAEDALUS_STREAM_BUFFER_SIZE"));

        let err = ConfigLoader::new()
            .with_env_prefix("DAEDALUS")
            .with_env_vars([("DAEDALUS_PIPELINE_DEFAULT_HEADERS", "x-service")])
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::EnvParseError { .. }));
    }

    #[test]
    fn test_env_override_is_validated() {
        let err = ConfigLoader::new()
            .with_env_prefix("DAEDALUS")
            .with_env_vars([("DAEDALUS_STREAM_BUFFER_SIZE", "0")])
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_load_unvalidated() {
        let mut config = ConfigLoader::new().load_unvalidated();
        config.stream.buffer_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }
}
