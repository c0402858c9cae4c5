//! Stream configuration.

use std::time::Duration;

/// Default number of frames queued between a callback and the response body.
pub const DEFAULT_BUFFER_SIZE: usize = 32;

/// Default idle time before a keep-alive comment is written.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Settings for event streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Frames queued before sends wait for the client to catch up.
    pub buffer_size: usize,
    /// Interval for `: keepalive` comments, or `None` for none.
    pub keep_alive_interval: Option<Duration>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            keep_alive_interval: Some(DEFAULT_KEEP_ALIVE),
        }
    }
}

impl StreamConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the buffer size. Zero is raised to one.
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Sets the keep-alive interval.
    #[must_use]
    pub fn with_keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = Some(interval);
        self
    }

    /// Disables keep-alive comments.
    #[must_use]
    pub fn without_keep_alive(mut self) -> Self {
        self.keep_alive_interval = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StreamConfig::default();
        assert_eq!(config.buffer_size, 32);
        assert_eq!(config.keep_alive_interval, Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_builder() {
        let config = StreamConfig::new().with_buffer_size(0).without_keep_alive();
        assert_eq!(config.buffer_size, 1);
        assert_eq!(config.keep_alive_interval, None);
    }
}
