//! Error types for the tracekit client.
//!
//! Only setup mistakes surface to the application. Delivery failures stay
//! inside the flush path as [`ExportError`] and are logged there.

use thiserror::Error;

/// Errors produced while delivering a batch of metrics to the collector.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExportError {
    /// Transport-layer error (connect, TLS, timeout, body read)
    #[error("transport error: {0}")]
    Transport(String),
    /// The collector answered with something other than 200
    #[error("HTTP {0}")]
    Status(u16),
    /// Payload could not be serialized
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ExportError {
    /// Returns `true` if the collector was reached and rejected the batch.
    #[inline]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Status(_))
    }
}

/// Errors surfaced to the instrumented application.
#[derive(Debug, Error)]
pub enum TracekitError {
    /// An operation needed the client before `ClientCell::init` ran.
    #[error("tracekit not initialized: call ClientCell::init first")]
    NotInitialized,
    /// `ClientCell::init` was called on a cell that already holds a client.
    #[error("tracekit already initialized")]
    AlreadyInitialized,
    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The HTTP client could not be constructed.
    #[error("exporter setup failed: {0}")]
    Export(#[from] ExportError),
    /// The background flush worker could not be spawned.
    #[error("failed to spawn flush worker: {0}")]
    Worker(#[from] std::io::Error),
}

impl TracekitError {
    /// Returns `true` for errors caused by application setup rather than runtime state.
    #[inline]
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::NotInitialized | Self::AlreadyInitialized | Self::InvalidConfig(_)
        )
    }
}
