//! Mount configuration
//!
//! Serde-deserializable settings with per-field defaults, loadable from a
//! TOML file. Everything here has a working default; an empty file is a
//! valid configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use crate::persistence::{DataStrategyKind, PathStrategyKind};

/// Configuration of one mounted filesystem instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountConfig {
    /// Reconciliation interval of the syncer, in milliseconds
    #[serde(default = "default_sync_interval_ms")]
    pub sync_interval_ms: u64,

    /// Data (content) strategy variant
    #[serde(default)]
    pub data_strategy: DataStrategyKind,

    /// Path-index strategy variant
    #[serde(default)]
    pub path_strategy: PathStrategyKind,

    /// Absolute replica-agreement threshold for consensus reads;
    /// `None` means majority of the responses received
    #[serde(default)]
    pub quorum: Option<usize>,

    /// Bounded wait for every remote operation, in milliseconds.
    ///
    /// Unset by default: remote operations are awaited indefinitely, so an
    /// unresponsive peer stalls the calling filesystem call. Setting a bound
    /// changes the failure semantics from indefinite block to operation
    /// abandon (`StoreError::Timeout`).
    #[serde(default)]
    pub op_timeout_ms: Option<u64>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_sync_interval_ms() -> u64 {
    2000
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            sync_interval_ms: default_sync_interval_ms(),
            data_strategy: DataStrategyKind::default(),
            path_strategy: PathStrategyKind::default(),
            quorum: None,
            op_timeout_ms: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl MountConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "sync_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.quorum == Some(0) {
            return Err(ConfigError::Invalid(
                "quorum threshold must be at least one replica".to_string(),
            ));
        }
        Ok(())
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    pub fn op_timeout(&self) -> Option<Duration> {
        self.op_timeout_ms.map(Duration::from_millis)
    }
}
