//! Agent selection configuration from TOML (`[selection]` section)

use concord_domain::DEFAULT_FALLBACK_COUNT;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSelectionConfig {
    /// Agents picked by capability overlap when none matches a task
    pub fallback_agent_count: usize,
}

impl Default for FileSelectionConfig {
    fn default() -> Self {
        Self {
            fallback_agent_count: DEFAULT_FALLBACK_COUNT,
        }
    }
}
