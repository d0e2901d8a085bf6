//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Snapshot loading error
    #[error("Snapshot error: {message}")]
    Snapshot {
        /// Error message
        message: String,
    },

    /// A page-side command was refused or failed
    #[error("Command failed: {message}")]
    Command {
        /// Error message
        message: String,
    },

    /// Findings at or above the failure threshold
    #[error("Scan gate failed: {message}")]
    ScanGate {
        /// Error message
        message: String,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Escudo library error
    #[error("Escudo error: {0}")]
    Escudo(#[from] escudo::EscudoError),

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a snapshot loading error
    #[must_use]
    pub fn snapshot(message: impl Into<String>) -> Self {
        Self::Snapshot {
            message: message.into(),
        }
    }

    /// Create a command failure error
    #[must_use]
    pub fn command(message: impl Into<String>) -> Self {
        Self::Command {
            message: message.into(),
        }
    }

    /// Create a scan gate error
    #[must_use]
    pub fn scan_gate(message: impl Into<String>) -> Self {
        Self::ScanGate {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}
