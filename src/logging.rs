//! Logging setup
//!
//! Structured logging via `tracing`, with level and format taken from the
//! mount configuration. The `SWARMFS_LOG` environment variable overrides
//! the configured level filter.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::error::ConfigError;

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Whether logging is enabled (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text (default: text)
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            level: default_log_level(),
            format: default_format(),
        }
    }
}

/// Install the global subscriber for this process.
///
/// Fails if a subscriber is already installed or the level string does not
/// parse.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigError> {
    if !config.enabled {
        return Ok(());
    }

    let filter = EnvFilter::try_from_env("SWARMFS_LOG")
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| ConfigError::Invalid(format!("invalid log level '{}': {}", config.level, e)))?;

    let registry = Registry::default().with(filter);
    let result = match config.format.as_str() {
        "json" => registry.with(fmt::layer().json()).try_init(),
        "text" => registry.with(fmt::layer()).try_init(),
        other => {
            return Err(ConfigError::Invalid(format!(
                "unknown log format '{other}', expected 'json' or 'text'"
            )))
        }
    };
    result.map_err(|e| ConfigError::Invalid(format!("could not install subscriber: {e}")))
}
