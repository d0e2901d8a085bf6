//! Result and error types for Escudo.

use thiserror::Error;

/// Result type for Escudo operations
pub type EscudoResult<T> = Result<T, EscudoError>;

/// Errors that can occur in Escudo
#[derive(Debug, Error)]
pub enum EscudoError {
    /// Demonstration requested while training mode is off
    #[error("Training mode must be active to run demonstrations")]
    TrainingInactive,

    /// Demonstration kind not recognized by the protocol
    #[error("Unknown demonstration type: {name}")]
    UnknownDemoType {
        /// The kind string that failed to parse
        name: String,
    },

    /// Operation requires a detected React instance
    #[error("React not detected on this page")]
    ReactNotDetected,

    /// State snapshot could not be written or read
    #[error("State persistence failed: {message}")]
    PersistenceFailure {
        /// Error message
        message: String,
    },

    /// A demonstration cleanup action failed
    #[error("Demonstration cleanup failed: {message}")]
    CleanupFailure {
        /// Error message
        message: String,
    },

    /// A scanner check failed internally
    #[error("Scan check {check} failed: {message}")]
    ScanCheckFailure {
        /// Name of the failing check
        check: String,
        /// Error message
        message: String,
    },

    /// Cross-context message could not be delivered
    #[error("Context transport failed: {message}")]
    Transport {
        /// Error message
        message: String,
    },

    /// Operation timed out
    #[error("Operation timed out after {ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EscudoError {
    /// Wraps a channel failure as a transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Wraps a cleanup failure message.
    #[must_use]
    pub fn cleanup(message: impl Into<String>) -> Self {
        Self::CleanupFailure {
            message: message.into(),
        }
    }
}
