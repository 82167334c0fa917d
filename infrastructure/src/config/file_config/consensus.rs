//! Consensus configuration from TOML (`[consensus]` section)

use concord_domain::DEFAULT_CONSENSUS_THRESHOLD;
use serde::{Deserialize, Serialize};

/// Raw consensus configuration from TOML
///
/// ```toml
/// [consensus]
/// threshold = 0.7
/// max_rounds = 10
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConsensusConfig {
    /// Share of participants that must agree, in `(0, 1]`
    pub threshold: f64,
    /// Proposal rounds before a negotiation gives up
    pub max_rounds: usize,
}

impl Default for FileConsensusConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_CONSENSUS_THRESHOLD,
            max_rounds: 10,
        }
    }
}
