//! Protocol configuration from TOML (`[protocols]` section)

use concord_domain::ProtocolKind;
use serde::{Deserialize, Serialize};

/// Raw protocol configuration from TOML
///
/// ```toml
/// [protocols]
/// default = "contract_net"
/// blackboard_rounds = 3
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProtocolsConfig {
    /// Protocol used when the caller does not pick one
    pub default: String,
    /// Upper bound on blackboard contribution rounds
    pub blackboard_rounds: usize,
}

impl Default for FileProtocolsConfig {
    fn default() -> Self {
        Self {
            default: ProtocolKind::default().to_string(),
            blackboard_rounds: 3,
        }
    }
}

impl FileProtocolsConfig {
    /// Parse `default`, falling back to [`ProtocolKind::default`].
    pub fn default_protocol(&self) -> ProtocolKind {
        self.default.parse().unwrap_or_default()
    }
}
