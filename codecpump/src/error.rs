//! Facade error type

use codecpump_core::CodecError;
use codecpump_media::MediaError;
use thiserror::Error;

/// Errors surfaced by [`StreamPlayer`](crate::StreamPlayer)
#[derive(Error, Debug)]
pub enum PumpError {
    /// Codec pipeline failure
    #[error("Codec error: {source}")]
    Codec {
        /// Underlying pipeline error
        #[from]
        source: CodecError,
    },

    /// Device or capture failure
    #[error("Media error: {source}")]
    Media {
        /// Underlying device error
        #[from]
        source: MediaError,
    },

    /// Stream bytes do not contain what the operation needs
    #[error("Invalid stream: {reason}")]
    InvalidStream {
        /// What was missing
        reason: String,
    },

    /// No render options have been set
    #[error("No render options to switch")]
    NoRenderOptions,

    /// Configuration could not be parsed
    #[error("Configuration error: {source}")]
    Configuration {
        /// Parser error
        #[from]
        source: serde_json::Error,
    },
}

/// Result type alias for facade operations
pub type PumpResult<T> = Result<T, PumpError>;

impl PumpError {
    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            PumpError::Codec { source } => source.is_recoverable(),
            PumpError::Media { source } => source.is_recoverable(),
            PumpError::InvalidStream { .. } => true,
            PumpError::NoRenderOptions => true,
            PumpError::Configuration { .. } => false,
        }
    }
}
