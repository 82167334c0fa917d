//! Capability kinds an agent can claim.
//!
//! Capabilities form a closed set: matching a task against an agent is a set
//! intersection over [`Capability`] values, never a fuzzy string comparison.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// A named skill or role an agent claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Analysis,
    Planning,
    Execution,
    Research,
    Writing,
    Reviewing,
    Coding,
    Testing,
    Design,
    DataProcessing,
    Coordination,
    Negotiation,
    /// Grants a bonus when scoring hierarchical leaders.
    Leadership,
}

impl Capability {
    /// Every capability, in declaration order.
    pub const ALL: [Capability; 13] = [
        Capability::Analysis,
        Capability::Planning,
        Capability::Execution,
        Capability::Research,
        Capability::Writing,
        Capability::Reviewing,
        Capability::Coding,
        Capability::Testing,
        Capability::Design,
        Capability::DataProcessing,
        Capability::Coordination,
        Capability::Negotiation,
        Capability::Leadership,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Analysis => "analysis",
            Capability::Planning => "planning",
            Capability::Execution => "execution",
            Capability::Research => "research",
            Capability::Writing => "writing",
            Capability::Reviewing => "reviewing",
            Capability::Coding => "coding",
            Capability::Testing => "testing",
            Capability::Design => "design",
            Capability::DataProcessing => "data_processing",
            Capability::Coordination => "coordination",
            Capability::Negotiation => "negotiation",
            Capability::Leadership => "leadership",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Capability {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| DomainError::InvalidCapability(s.to_string()))
    }
}
