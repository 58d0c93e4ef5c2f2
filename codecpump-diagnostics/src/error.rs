//! Diagnostics error types

use thiserror::Error;

/// Errors raised while setting up logging or exporting diagnostics
#[derive(Error, Debug)]
pub enum DiagnosticsError {
    /// A global subscriber is already installed
    #[error("Logging already initialized: {reason}")]
    LoggingInitialized {
        /// Subscriber error
        reason: String,
    },

    /// Filter directive could not be parsed
    #[error("Invalid log filter '{directive}': {reason}")]
    InvalidFilter {
        /// Directive as given
        directive: String,
        /// Parse error
        reason: String,
    },

    /// Export serialization failed
    #[error("Serialization error: {source}")]
    Serialization {
        /// Underlying serializer error
        #[from]
        source: serde_json::Error,
    },
}

/// Result type alias for diagnostics operations
pub type DiagnosticsResult<T> = Result<T, DiagnosticsError>;
