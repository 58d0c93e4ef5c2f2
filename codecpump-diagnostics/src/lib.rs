//! # codecpump diagnostics
//!
//! Logging setup and lifecycle diagnostics for codecpump.
//! Provides `tracing` subscriber initialization and a state observer that
//! records every codec transition for later inspection or JSON export.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod debug_logger;
pub mod error;
pub mod transition_log;

// Re-export main types
pub use debug_logger::DebugLogger;
pub use error::{DiagnosticsError, DiagnosticsResult};
pub use transition_log::{CodecSummary, TransitionRecord, TransitionRecorder};
