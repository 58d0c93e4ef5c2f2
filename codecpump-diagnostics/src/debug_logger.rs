//! Structured debug logging setup

use crate::error::{DiagnosticsError, DiagnosticsResult};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info";

/// Installs the global `tracing` subscriber
#[derive(Debug, Default)]
pub struct DebugLogger;

impl DebugLogger {
    /// Initialize logging from `RUST_LOG`, falling back to `info`.
    ///
    /// A subscriber installed earlier (by the host application or another
    /// test) is left in place.
    pub fn init_logging() -> DiagnosticsResult<()> {
        match Self::try_init_logging() {
            Ok(()) => Ok(()),
            Err(DiagnosticsError::LoggingInitialized { reason }) => {
                debug!(%reason, "Keeping the installed log subscriber");
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    /// Initialize logging, failing if a global subscriber already exists
    pub fn try_init_logging() -> DiagnosticsResult<()> {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        Self::install(filter)
    }

    /// Initialize logging with an explicit filter directive such as
    /// `"codecpump_media=debug,info"`
    pub fn init_with_filter(directive: &str) -> DiagnosticsResult<()> {
        let filter =
            EnvFilter::try_new(directive).map_err(|e| DiagnosticsError::InvalidFilter {
                directive: directive.to_string(),
                reason: e.to_string(),
            })?;
        Self::install(filter)
    }

    fn install(filter: EnvFilter) -> DiagnosticsResult<()> {
        let directive = filter.to_string();
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .try_init()
            .map_err(|e| DiagnosticsError::LoggingInitialized {
                reason: e.to_string(),
            })?;
        info!(filter = %directive, "Debug logging installed");
        Ok(())
    }
}
