//! Error types for codec lifecycle and bitstream handling

use crate::state::{CodecState, Operation};
use thiserror::Error;

/// Main error type for codec operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Sample rate, channel layout or profile cannot be expressed
    #[error("Unsupported format: {format}")]
    UnsupportedFormat {
        /// Format description
        format: String,
    },

    /// Decoder configured without initialization data
    #[error("Missing codec-specific data for {codec}")]
    MissingCodecSpecificData {
        /// Codec name
        codec: String,
    },

    /// The hardware endpoint could not be opened
    #[error("Endpoint creation failed: {codec} - {reason}")]
    EndpointCreation {
        /// Codec name
        codec: String,
        /// Failure reason
        reason: String,
    },

    /// Endpoint handle is gone (released or never created)
    #[error("Codec endpoint has no instance")]
    NoInstance,

    /// Endpoint exists but was not configured
    #[error("Codec endpoint is not configured")]
    NotConfigured,

    /// Operation invoked in a state where it is not legal
    #[error("Illegal state: cannot {operation} while {state}")]
    IllegalState {
        /// Rejected operation
        operation: Operation,
        /// State at the time of the call
        state: CodecState,
    },

    /// Hardware queue is congested, retry on the next tick
    #[error("Try again later")]
    TryAgain,

    /// Any other hardware-reported failure
    #[error("Hardware error: {reason}")]
    Hardware {
        /// Failure reason
        reason: String,
    },

    /// Malformed ADTS header
    #[error("Invalid ADTS header: {reason}")]
    InvalidHeader {
        /// Failure reason
        reason: String,
    },

    /// Malformed or truncated buffer
    #[error("Invalid data: {reason}")]
    InvalidData {
        /// Failure reason
        reason: String,
    },

    /// Endpoint cannot swap its render target in place
    #[error("Output target cannot be reassigned without reconfiguration")]
    RetargetUnsupported,
}

/// Result type alias for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

impl CodecError {
    /// Get error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            CodecError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            CodecError::MissingCodecSpecificData { .. } => "MISSING_CSD",
            CodecError::EndpointCreation { .. } => "ENDPOINT_CREATION_FAILED",
            CodecError::NoInstance => "NO_INSTANCE",
            CodecError::NotConfigured => "NOT_CONFIGURED",
            CodecError::IllegalState { .. } => "ILLEGAL_STATE",
            CodecError::TryAgain => "TRY_AGAIN",
            CodecError::Hardware { .. } => "HARDWARE_ERROR",
            CodecError::InvalidHeader { .. } => "INVALID_HEADER",
            CodecError::InvalidData { .. } => "INVALID_DATA",
            CodecError::RetargetUnsupported => "RETARGET_UNSUPPORTED",
        }
    }

    /// Check if error is recoverable without reconstructing the pipeline
    pub fn is_recoverable(&self) -> bool {
        match self {
            CodecError::TryAgain => true,
            CodecError::Hardware { .. } => true,
            CodecError::IllegalState { .. } => true,
            CodecError::RetargetUnsupported => true,
            CodecError::InvalidData { .. } => true,
            CodecError::UnsupportedFormat { .. } => false,
            CodecError::MissingCodecSpecificData { .. } => false,
            CodecError::EndpointCreation { .. } => false,
            CodecError::NoInstance => false,
            CodecError::NotConfigured => false,
            CodecError::InvalidHeader { .. } => false,
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            CodecError::UnsupportedFormat { .. } => ErrorCategory::Configuration,
            CodecError::MissingCodecSpecificData { .. } => ErrorCategory::Configuration,
            CodecError::EndpointCreation { .. } => ErrorCategory::Configuration,
            CodecError::NoInstance => ErrorCategory::Hardware,
            CodecError::NotConfigured => ErrorCategory::Hardware,
            CodecError::IllegalState { .. } => ErrorCategory::State,
            CodecError::TryAgain => ErrorCategory::Congestion,
            CodecError::Hardware { .. } => ErrorCategory::Hardware,
            CodecError::InvalidHeader { .. } => ErrorCategory::Format,
            CodecError::InvalidData { .. } => ErrorCategory::Format,
            CodecError::RetargetUnsupported => ErrorCategory::Hardware,
        }
    }

    /// Shorthand for an unsupported format error
    pub fn unsupported(format: impl Into<String>) -> Self {
        CodecError::UnsupportedFormat {
            format: format.into(),
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Unsupported parameters, missing init data, endpoint could not open
    Configuration,
    /// Transient queue congestion
    Congestion,
    /// Lifecycle misuse
    State,
    /// Endpoint-reported failures
    Hardware,
    /// Bitstream and buffer errors
    Format,
}
