//! Error types for the filesystem core.
//!
//! `StoreError` covers the persistence/DHT boundary, `FsError` covers tree
//! and lookup failures. Remote failures never escape the filesystem call
//! adapter as raw errors; they are converted to status codes or absorbed at
//! the operation boundary.

use std::time::Duration;
use thiserror::Error;

/// Errors raised at the persistence strategy / DHT boundary
#[derive(Debug, Error)]
pub enum StoreError {
    /// A remote peer operation failed (I/O, routing, replica unreachable)
    #[error("remote operation failed: {0}")]
    Remote(String),

    /// A value could not be encoded or decoded
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A bounded wait was configured and expired before the remote answered
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors raised by tree operations and path lookup
#[derive(Debug, Error)]
pub enum FsError {
    #[error("path not found: {0}")]
    NotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised while loading or applying configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Error returned by an event listener; aborts the remaining listeners
/// registered for the same event name.
#[derive(Debug, Error)]
#[error("listener for event '{event}' failed: {message}")]
pub struct ListenerError {
    pub event: String,
    pub message: String,
}

impl ListenerError {
    pub fn new(event: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            message: message.into(),
        }
    }
}
