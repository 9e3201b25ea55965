//! Configuration defaults and logging setup.
//!
//! Connections are configured in-process through
//! [`ConnectionOptions`](crate::models::ConnectionOptions); this module holds the
//! shared defaults, the pool tuning knobs and the tracing subscriber setup.

use std::time::Duration;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub const DEFAULT_CONNECTION_NAME: &str = "default";
pub const DEFAULT_MAX_QUERY_EXECUTION_TIME: Duration = Duration::from_secs(60);
pub const DEFAULT_LOG_LEVEL: &str = "info";

// Pool configuration defaults
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_MIN_CONNECTIONS: u32 = 0;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Connection pool configuration options.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PoolOptions {
    /// Maximum connections in pool (default: 10)
    pub max_connections: Option<u32>,
    /// Minimum idle connections kept open (default: 0)
    pub min_connections: Option<u32>,
    /// Idle timeout in seconds (default: 600)
    pub idle_timeout_secs: Option<u64>,
    /// Connection acquire timeout in seconds (default: 30)
    pub acquire_timeout_secs: Option<u64>,
    /// Whether to test connections before use (default: true)
    pub test_before_acquire: Option<bool>,
}

impl PoolOptions {
    pub fn max_connections_or_default(&self) -> u32 {
        self.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS)
    }

    pub fn min_connections_or_default(&self) -> u32 {
        self.min_connections.unwrap_or(DEFAULT_MIN_CONNECTIONS)
    }

    pub fn idle_timeout_or_default(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs.unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS))
    }

    pub fn acquire_timeout_or_default(&self) -> Duration {
        Duration::from_secs(
            self.acquire_timeout_secs
                .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        )
    }

    pub fn test_before_acquire_or_default(&self) -> bool {
        self.test_before_acquire.unwrap_or(true)
    }

    /// Validate pool options and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(max) = self.max_connections {
            if max == 0 {
                return Err("max_connections must be greater than 0".to_string());
            }
        }
        if let Some(min) = self.min_connections {
            let max = self.max_connections_or_default();
            if min > max {
                return Err(format!(
                    "min_connections ({}) cannot exceed max_connections ({})",
                    min, max
                ));
            }
        }
        Ok(())
    }
}

/// Settings for the global tracing subscriber.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. Fails if a global
/// subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json {
        subscriber.with(fmt::layer().json()).try_init()
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .try_init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_options_defaults() {
        let opts = PoolOptions::default();
        assert_eq!(opts.max_connections_or_default(), DEFAULT_MAX_CONNECTIONS);
        assert_eq!(opts.min_connections_or_default(), DEFAULT_MIN_CONNECTIONS);
        assert_eq!(opts.acquire_timeout_or_default(), Duration::from_secs(30));
        assert_eq!(opts.idle_timeout_or_default(), Duration::from_secs(600));
        assert!(opts.test_before_acquire_or_default());
    }

    #[test]
    fn test_pool_options_validate_zero_max() {
        let opts = PoolOptions {
            max_connections: Some(0),
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_pool_options_validate_min_exceeds_max() {
        let opts = PoolOptions {
            max_connections: Some(2),
            min_connections: Some(5),
            ..Default::default()
        };
        let err = opts.validate().unwrap_err();
        assert!(err.contains("cannot exceed"));
    }

    #[test]
    fn test_pool_options_validate_min_against_default_max() {
        let opts = PoolOptions {
            min_connections: Some(DEFAULT_MAX_CONNECTIONS + 1),
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_logging_config_deserialize_defaults() {
        let config: LoggingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.level, "info");
        assert!(!config.json);
    }
}
