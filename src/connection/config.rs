//! Session options and connection configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default TCP connect timeout (10 seconds)
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default per-read/per-write socket timeout (10 seconds)
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll interval of `Options::DEFAULT`
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Buffer capacity of the unauthenticated transport (24 MiB)
pub const DEFAULT_BUFFER_CAPACITY: usize = 24 * 1024 * 1024;

/// Polling options handed to the query cursor
///
/// Immutable once a session is created; each session keeps its own copy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Options {
    /// Delay between query state polls, in seconds (must be > 0)
    pub poll_interval_secs: f64,
    /// Rows requested per fetch (must be > 0)
    pub batch_size: u32,
}

impl Options {
    /// 100 ms poll interval, 10 000 rows per fetch
    pub const DEFAULT: Options = Options {
        poll_interval_secs: 0.1,
        batch_size: 10_000,
    };

    /// Create validated options
    pub fn new(poll_interval_secs: f64, batch_size: u32) -> Result<Self> {
        let options = Self {
            poll_interval_secs,
            batch_size,
        };
        options.validate()?;
        Ok(options)
    }

    /// Check the field constraints
    pub fn validate(&self) -> Result<()> {
        if !self.poll_interval_secs.is_finite() || self.poll_interval_secs <= 0.0 {
            return Err(Error::Config(format!(
                "poll interval must be a positive number of seconds, got {}",
                self.poll_interval_secs
            )));
        }
        if self.batch_size == 0 || self.batch_size > i32::MAX as u32 {
            return Err(Error::Config(format!(
                "batch size must be between 1 and {}, got {}",
                i32::MAX,
                self.batch_size
            )));
        }
        Ok(())
    }

    /// Poll interval as a `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.poll_interval_secs).unwrap_or(DEFAULT_POLL_INTERVAL)
    }

    /// Batch size as the wire `fetch_size`
    pub fn fetch_size(&self) -> i32 {
        i32::try_from(self.batch_size).unwrap_or(i32::MAX)
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Connection configuration
///
/// Transport-level settings. Use `ConnectionConfig::builder()` to override defaults.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// TCP connect timeout (default: 10 seconds)
    pub connect_timeout: Duration,
    /// Timeout applied to each socket read and write (default: 10 seconds)
    pub io_timeout: Option<Duration>,
    /// Buffer capacity of the unauthenticated transport (default: 24 MiB)
    pub buffer_capacity: usize,
    /// User the server should run queries as
    pub hadoop_user: Option<String>,
}

impl ConnectionConfig {
    /// Create a builder for advanced configuration
    ///
    /// # Examples
    ///
    /// ```
    /// use impala_wire::ConnectionConfig;
    /// use std::time::Duration;
    ///
    /// let config = ConnectionConfig::builder()
    ///     .connect_timeout(Duration::from_secs(3))
    ///     .io_timeout(Some(Duration::from_secs(60)))
    ///     .hadoop_user("etl")
    ///     .build();
    /// assert_eq!(config.connect_timeout, Duration::from_secs(3));
    /// ```
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder {
            config: Self::default(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: Some(DEFAULT_IO_TIMEOUT),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            hadoop_user: None,
        }
    }
}

/// Builder for creating `ConnectionConfig`
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    /// Set TCP connect timeout
    ///
    /// Default: 10 seconds
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.config.connect_timeout = duration;
        self
    }

    /// Set the per-operation socket timeout, `None` to wait indefinitely
    ///
    /// Default: 10 seconds
    pub fn io_timeout(mut self, duration: Option<Duration>) -> Self {
        self.config.io_timeout = duration;
        self
    }

    /// Set the buffered transport capacity
    ///
    /// Default: 24 MiB
    pub fn buffer_capacity(mut self, bytes: usize) -> Self {
        self.config.buffer_capacity = bytes;
        self
    }

    /// Set the user queries run as
    ///
    /// Default: None (server decides)
    pub fn hadoop_user(mut self, user: impl Into<String>) -> Self {
        self.config.hadoop_user = Some(user.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> ConnectionConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = Options::default();
        assert_eq!(options, Options::DEFAULT);
        assert_eq!(options.poll_interval(), Duration::from_millis(100));
        assert_eq!(options.fetch_size(), 10_000);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_reject_non_positive_poll_interval() {
        assert!(Options::new(0.0, 10).is_err());
        assert!(Options::new(-1.5, 10).is_err());
        assert!(Options::new(f64::NAN, 10).is_err());
        assert!(Options::new(f64::INFINITY, 10).is_err());
    }

    #[test]
    fn test_options_reject_bad_batch_size() {
        assert!(Options::new(0.5, 0).is_err());
        assert!(Options::new(0.5, u32::MAX).is_err());
        assert!(Options::new(0.5, i32::MAX as u32).is_ok());
    }

    #[test]
    fn test_fractional_poll_interval() {
        let options = Options::new(0.25, 100).unwrap();
        assert_eq!(options.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_options_deserialize() {
        let options: Options =
            serde_json::from_str(r#"{"poll_interval_secs": 2.5, "batch_size": 512}"#).unwrap();
        assert_eq!(options.poll_interval(), Duration::from_millis(2500));
        assert_eq!(options.batch_size, 512);
    }

    #[test]
    fn test_connection_config_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.io_timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.buffer_capacity, 24 * 1024 * 1024);
        assert!(config.hadoop_user.is_none());
    }

    #[test]
    fn test_connection_config_builder_fluent() {
        let config = ConnectionConfig::builder()
            .connect_timeout(Duration::from_secs(2))
            .io_timeout(None)
            .buffer_capacity(64 * 1024)
            .hadoop_user("etl")
            .build();

        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.io_timeout, None);
        assert_eq!(config.buffer_capacity, 64 * 1024);
        assert_eq!(config.hadoop_user, Some("etl".to_string()));
    }
}
