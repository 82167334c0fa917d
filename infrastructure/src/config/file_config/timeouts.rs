//! Timeout configuration from TOML (`[timeouts]` section)
//!
//! Every value is in seconds.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw timeout configuration from TOML
///
/// ```toml
/// [timeouts]
/// request_seconds = 30
/// plan_seconds = 30
/// subtask_seconds = 60
/// synthesis_seconds = 30
/// round_seconds = 30
/// vote_seconds = 15
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTimeoutsConfig {
    /// Single request/reply exchanges and broadcasts outside negotiation
    pub request_seconds: u64,
    /// Leader's plan in the hierarchical protocol
    pub plan_seconds: u64,
    /// Each dispatched subtask
    pub subtask_seconds: u64,
    /// Leader's synthesis of subtask results
    pub synthesis_seconds: u64,
    /// Proposal collection per negotiation round
    pub round_seconds: u64,
    /// Vote collection once a proposal wins
    pub vote_seconds: u64,
}

impl Default for FileTimeoutsConfig {
    fn default() -> Self {
        Self {
            request_seconds: 30,
            plan_seconds: 30,
            subtask_seconds: 60,
            synthesis_seconds: 30,
            round_seconds: 30,
            vote_seconds: 15,
        }
    }
}

impl FileTimeoutsConfig {
    /// `(field, seconds)` for every timeout.
    pub(crate) fn fields(&self) -> [(&'static str, u64); 6] {
        [
            ("timeouts.request_seconds", self.request_seconds),
            ("timeouts.plan_seconds", self.plan_seconds),
            ("timeouts.subtask_seconds", self.subtask_seconds),
            ("timeouts.synthesis_seconds", self.synthesis_seconds),
            ("timeouts.round_seconds", self.round_seconds),
            ("timeouts.vote_seconds", self.vote_seconds),
        ]
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_seconds)
    }

    pub fn plan(&self) -> Duration {
        Duration::from_secs(self.plan_seconds)
    }

    pub fn subtask(&self) -> Duration {
        Duration::from_secs(self.subtask_seconds)
    }

    pub fn synthesis(&self) -> Duration {
        Duration::from_secs(self.synthesis_seconds)
    }

    pub fn round(&self) -> Duration {
        Duration::from_secs(self.round_seconds)
    }

    pub fn vote(&self) -> Duration {
        Duration::from_secs(self.vote_seconds)
    }
}
