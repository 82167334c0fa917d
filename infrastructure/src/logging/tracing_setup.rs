//! Process-wide `tracing` subscriber setup.

use std::path::PathBuf;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Where and how verbosely diagnostics are written.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for daily-rolling log files; stderr when `None`.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "concord.log".to_string(),
        }
    }
}

impl LoggingSettings {
    /// `RUST_LOG` when set and valid, otherwise the configured level.
    pub fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.level).map_err(|e| LoggingError::InvalidFilter {
            directive: self.level.clone(),
            reason: e.to_string(),
        })
    }
}

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter '{directive}': {reason}")]
    InvalidFilter { directive: String, reason: String },

    #[error("A global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Install the global subscriber.
///
/// When logging to files, the returned guard must be kept alive for the
/// lifetime of the process; dropping it flushes and stops the writer thread.
pub fn init_tracing(settings: &LoggingSettings) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = settings.env_filter()?;

    match &settings.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &settings.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .try_init()
                .map_err(|_| LoggingError::AlreadyInitialized)?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .try_init()
                .map_err(|_| LoggingError::AlreadyInitialized)?;
            Ok(None)
        }
    }
}
