//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! Every section is optional; missing keys take their defaults.

mod bus;
mod consensus;
mod logging;
mod protocols;
mod selection;
mod timeouts;

pub use bus::FileBusConfig;
pub use consensus::FileConsensusConfig;
pub use logging::FileLoggingConfig;
pub use protocols::FileProtocolsConfig;
pub use selection::FileSelectionConfig;
pub use timeouts::FileTimeoutsConfig;

use crate::logging::{JsonlCollaborationLogger, LoggingSettings};
use concord_application::CollaborationParams;
use concord_domain::ProtocolKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigValidationError {
    #[error("{field} cannot be 0")]
    Zero { field: &'static str },

    #[error("consensus.threshold must be in (0, 1], got {0}")]
    ThresholdOutOfRange(f64),

    #[error("protocols.default is not a known protocol: {0}")]
    UnknownProtocol(String),

    #[error("logging.level is not a valid filter directive: {0}")]
    InvalidLogLevel(String),
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub bus: FileBusConfig,
    pub timeouts: FileTimeoutsConfig,
    pub consensus: FileConsensusConfig,
    pub selection: FileSelectionConfig,
    pub protocols: FileProtocolsConfig,
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning every problem found.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut issues = Vec::new();

        let counts = [
            ("bus.queue_capacity", self.bus.queue_capacity),
            ("consensus.max_rounds", self.consensus.max_rounds),
            ("selection.fallback_agent_count", self.selection.fallback_agent_count),
            ("protocols.blackboard_rounds", self.protocols.blackboard_rounds),
        ];
        issues.extend(
            counts
                .into_iter()
                .filter(|(_, value)| *value == 0)
                .map(|(field, _)| ConfigValidationError::Zero { field }),
        );
        issues.extend(
            self.timeouts
                .fields()
                .into_iter()
                .filter(|(_, seconds)| *seconds == 0)
                .map(|(field, _)| ConfigValidationError::Zero { field }),
        );

        let threshold = self.consensus.threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            issues.push(ConfigValidationError::ThresholdOutOfRange(threshold));
        }

        if self.protocols.default.parse::<ProtocolKind>().is_err() {
            issues.push(ConfigValidationError::UnknownProtocol(self.protocols.default.clone()));
        }

        if EnvFilter::try_new(&self.logging.level).is_err() {
            issues.push(ConfigValidationError::InvalidLogLevel(self.logging.level.clone()));
        }

        issues
    }

    /// Engine parameters described by this file.
    pub fn to_params(&self) -> CollaborationParams {
        CollaborationParams::default()
            .with_queue_capacity(self.bus.queue_capacity)
            .with_request_timeout(self.timeouts.request())
            .with_plan_timeout(self.timeouts.plan())
            .with_subtask_timeout(self.timeouts.subtask())
            .with_synthesis_timeout(self.timeouts.synthesis())
            .with_round_timeout(self.timeouts.round())
            .with_vote_timeout(self.timeouts.vote())
            .with_consensus_threshold(self.consensus.threshold)
            .with_max_rounds(self.consensus.max_rounds)
            .with_fallback_agent_count(self.selection.fallback_agent_count)
            .with_blackboard_rounds(self.protocols.blackboard_rounds)
    }

    pub fn logging_settings(&self) -> LoggingSettings {
        LoggingSettings {
            level: self.logging.level.clone(),
            directory: self.logging.directory.clone(),
            file_prefix: self.logging.file_prefix.clone(),
        }
    }

    /// Transcript logger for `logging.transcript`, if one is configured and
    /// the file can be opened.
    pub fn transcript_logger(&self) -> Option<JsonlCollaborationLogger> {
        self.logging
            .transcript
            .as_ref()
            .and_then(JsonlCollaborationLogger::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_deserialize_full_config() {
        let toml_str = r#"
[bus]
queue_capacity = 64

[timeouts]
request_seconds = 5
plan_seconds = 10
subtask_seconds = 120
vote_seconds = 3

[consensus]
threshold = 0.75
max_rounds = 4

[selection]
fallback_agent_count = 2

[protocols]
default = "contract-net"
blackboard_rounds = 6

[logging]
level = "concord=debug"
directory = "/var/log/concord"
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_empty());
        assert_eq!(config.protocols.default_protocol(), ProtocolKind::ContractNet);

        let params = config.to_params();
        assert_eq!(params.queue_capacity, 64);
        assert_eq!(params.request_timeout, Duration::from_secs(5));
        assert_eq!(params.subtask_timeout, Duration::from_secs(120));
        // Unset keys keep their defaults.
        assert_eq!(params.round_timeout, Duration::from_secs(30));
        assert_eq!(params.consensus_threshold, 0.75);
        assert_eq!(params.max_rounds, 4);
        assert_eq!(params.fallback_agent_count, 2);
        assert_eq!(params.blackboard_rounds, 6);

        let logging = config.logging_settings();
        assert_eq!(logging.level, "concord=debug");
        assert_eq!(logging.directory, Some("/var/log/concord".into()));
    }

    #[test]
    fn test_default_config_matches_params() {
        let config = FileConfig::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.to_params(), CollaborationParams::default());
        assert_eq!(config.protocols.default_protocol(), ProtocolKind::Hierarchical);
        assert!(config.transcript_logger().is_none());
    }

    #[test]
    fn test_transcript_logger_opens_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = FileConfig::default();
        config.logging.transcript = Some(dir.path().join("run.jsonl"));

        let logger = config.transcript_logger().unwrap();
        assert_eq!(logger.path(), dir.path().join("run.jsonl"));
    }

    #[test]
    fn test_validate_reports_every_issue() {
        let toml_str = r#"
[bus]
queue_capacity = 0

[timeouts]
vote_seconds = 0

[consensus]
threshold = 1.5

[protocols]
default = "anarchy"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        let issues = config.validate();

        assert_eq!(issues.len(), 4);
        assert!(issues.contains(&ConfigValidationError::Zero {
            field: "bus.queue_capacity"
        }));
        assert!(issues.contains(&ConfigValidationError::Zero {
            field: "timeouts.vote_seconds"
        }));
        assert!(issues.contains(&ConfigValidationError::ThresholdOutOfRange(1.5)));
        assert_eq!(
            issues[3].to_string(),
            "protocols.default is not a known protocol: anarchy"
        );
    }

    #[test]
    fn test_zero_threshold_is_rejected() {
        let mut config = FileConfig::default();
        config.consensus.threshold = 0.0;
        assert_eq!(
            config.validate(),
            vec![ConfigValidationError::ThresholdOutOfRange(0.0)]
        );
    }
}
