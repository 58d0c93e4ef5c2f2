//! Media error types and handling
//!
//! Codec lifecycle failures come from `codecpump-core` as [`CodecError`] and
//! are wrapped here; everything else is about the audio devices owned by the
//! capture loop and the playback sink.

use codecpump_core::CodecError;
use thiserror::Error;

/// Main error type for capture, playback and pipeline operations
#[derive(Error, Debug)]
pub enum MediaError {
    /// Codec pipeline failure
    #[error("Codec error: {source}")]
    Codec {
        #[from]
        source: CodecError,
    },

    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Invalid configuration provided
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Error message
        message: String,
    },

    /// Capture session already running
    #[error("Capture already started")]
    AlreadyStarted,

    /// Capture not active error
    #[error("Capture not active")]
    CaptureNotActive,

    /// Device could not be opened with the requested parameters
    #[error("Device unavailable: {device} - {reason}")]
    DeviceUnavailable {
        /// Device description
        device: String,
        /// Failure reason
        reason: String,
    },

    /// Device call failed after opening
    #[error("Device error: {message}")]
    Device {
        /// Error message
        message: String,
    },

    /// Thread could not be spawned
    #[error("Failed to spawn {name} thread: {reason}")]
    ThreadSpawn {
        /// Thread name
        name: String,
        /// Failure reason
        reason: String,
    },
}

/// Result type alias for media operations
pub type MediaResult<T> = Result<T, MediaError>;

impl MediaError {
    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            MediaError::Codec { source } => source.is_recoverable(),
            MediaError::Io { .. } => true,
            MediaError::AlreadyStarted => true,
            MediaError::CaptureNotActive => true,
            MediaError::Device { .. } => true,
            MediaError::InvalidConfiguration { .. } => false,
            MediaError::DeviceUnavailable { .. } => false,
            MediaError::ThreadSpawn { .. } => false,
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            MediaError::Codec { .. } => ErrorCategory::Codec,
            MediaError::Io { .. } => ErrorCategory::System,
            MediaError::InvalidConfiguration { .. } => ErrorCategory::Configuration,
            MediaError::AlreadyStarted => ErrorCategory::State,
            MediaError::CaptureNotActive => ErrorCategory::State,
            MediaError::DeviceUnavailable { .. } => ErrorCategory::Device,
            MediaError::Device { .. } => ErrorCategory::Device,
            MediaError::ThreadSpawn { .. } => ErrorCategory::System,
        }
    }

    /// Shorthand for a device call failure
    pub fn device(message: impl Into<String>) -> Self {
        MediaError::Device {
            message: message.into(),
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// System-level errors (I/O, threads)
    System,
    /// Configuration and parameter errors
    Configuration,
    /// Codec pipeline errors
    Codec,
    /// Device and hardware errors
    Device,
    /// State management errors
    State,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let device = MediaError::DeviceUnavailable {
            device: "audio input".to_string(),
            reason: "buffer size rejected".to_string(),
        };
        assert_eq!(device.category(), ErrorCategory::Device);
        assert!(!device.is_recoverable());

        let congested = MediaError::from(CodecError::TryAgain);
        assert_eq!(congested.category(), ErrorCategory::Codec);
        assert!(congested.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let error = MediaError::from(CodecError::NoInstance);
        assert_eq!(error.to_string(), "Codec error: Codec endpoint has no instance");
    }
}
