//! Application error types for galle-bouncer
//!
//! This module defines the error taxonomy shared by the decision source,
//! the enforcement sink and the synchronization loop.
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

use crate::config::ConfigError;
use crate::otel::OtelError;

/// Errors raised while talking to the upstream decision source
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SourceError {
    /// The upstream source rejected our credentials
    #[error("Access forbidden: API key not accepted")]
    Forbidden,

    /// The upstream source could not be reached in time
    #[error("Connection timed out: {0}")]
    Timeout(String),

    /// Any other upstream failure (unexpected status, malformed body, ...)
    #[error("Decision source error: {0}")]
    Other(String),
}

/// Errors raised while pushing a ban set to the enforcement sink
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PushError {
    /// The sink could not be reached
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The sink answered with a non-success status code
    #[error("Ban list update rejected with HTTP {0}")]
    Status(u16),
}

/// Errors returned by the synchronization loop
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyncError {
    /// Fatal upstream failure during establishment
    #[error("Upstream error: {0}")]
    Source(#[from] SourceError),

    /// Shutdown was requested before the loop finished
    #[error("Synchronization cancelled")]
    Cancelled,
}

/// Application-level error type
///
/// Aggregates every error that can end the process with a failure status.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error
    #[error("Invalid config file: {0}")]
    Config(#[from] ConfigError),

    /// Sync error
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// OpenTelemetry setup error
    #[error("Telemetry error: {0}")]
    Otel(#[from] OtelError),

    /// HTTP client construction error
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Trait for determining if an error is retryable
pub trait RetryableError {
    /// Returns true if the error is retryable
    fn is_retryable(&self) -> bool;
}

impl RetryableError for SourceError {
    fn is_retryable(&self) -> bool {
        matches!(self, SourceError::Timeout(_))
    }
}
