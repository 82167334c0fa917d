//! Configuration file loading for concord
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `CONCORD_*` environment variables (`CONCORD_TIMEOUTS__VOTE_SECONDS=5`)
//! 2. Explicitly passed config file
//! 3. Project root: `./concord.toml` or `./.concord.toml`
//! 4. Global: `$XDG_CONFIG_HOME/concord/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileBusConfig, FileConfig, FileConsensusConfig, FileLoggingConfig,
    FileProtocolsConfig, FileSelectionConfig, FileTimeoutsConfig,
};
pub use loader::{ConfigLoader, ENV_PREFIX};
