//! Logging configuration from TOML (`[logging]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw logging configuration from TOML
///
/// ```toml
/// [logging]
/// level = "debug"
/// directory = "~/.local/state/concord/logs"
/// transcript = "collaboration.jsonl"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    /// Directory for daily-rolling log files; stderr when unset
    pub directory: Option<PathBuf>,
    /// File name prefix of rolling log files
    pub file_prefix: String,
    /// JSONL collaboration transcript path
    pub transcript: Option<PathBuf>,
}

impl Default for FileLoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "concord.log".to_string(),
            transcript: None,
        }
    }
}
