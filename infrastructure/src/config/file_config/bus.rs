//! Message bus configuration from TOML (`[bus]` section)

use concord_application::config::DEFAULT_QUEUE_CAPACITY;
use serde::{Deserialize, Serialize};

/// Raw bus configuration from TOML
///
/// ```toml
/// [bus]
/// queue_capacity = 1000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBusConfig {
    /// Per-agent inbox size; the oldest message is dropped on overflow
    pub queue_capacity: usize,
}

impl Default for FileBusConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}
