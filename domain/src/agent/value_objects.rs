//! Agent value objects.
//!
//! # Identifiers
//! - [`AgentId`] - Unique identifier for a registered agent
//!
//! # Descriptors
//! - [`AgentProfile`] - What the engine knows about an agent: its name,
//!   capabilities, historical performance and memory size

use super::capability::Capability;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Unique identifier for an agent.
///
/// Ordering is lexicographic and is used for every deterministic tie-break
/// (leader selection, consensus value choice, fallback ranking).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Identifier of the coordinator mailbox owned by the engine itself.
    pub const SYSTEM: &'static str = "system";

    /// Creates an AgentId from an existing string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The coordinator mailbox id.
    pub fn system() -> Self {
        Self(Self::SYSTEM.to_string())
    }

    /// Generates a new unique AgentId.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Whether this id denotes the engine rather than a participant.
    pub fn is_system(&self) -> bool {
        self.0 == Self::SYSTEM
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T: Into<String>> From<T> for AgentId {
    fn from(s: T) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Descriptor of a participating agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: AgentId,
    pub name: String,
    pub capabilities: BTreeSet<Capability>,
    /// Historical performance scores, each in `[0, 1]`.
    #[serde(default)]
    pub performance_history: Vec<f64>,
    /// Number of entries in the agent's episodic memory.
    #[serde(default)]
    pub memory_size: usize,
}

impl AgentProfile {
    pub fn new(id: impl Into<AgentId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            capabilities: BTreeSet::new(),
            performance_history: Vec::new(),
            memory_size: 0,
        }
    }

    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities.extend(capabilities);
        self
    }

    pub fn with_performance(mut self, scores: impl IntoIterator<Item = f64>) -> Self {
        self.performance_history
            .extend(scores.into_iter().map(|s| s.clamp(0.0, 1.0)));
        self
    }

    pub fn with_memory_size(mut self, size: usize) -> Self {
        self.memory_size = size;
        self
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Number of `required` capabilities this agent has. Duplicates in
    /// `required` are counted once.
    pub fn capability_overlap(&self, required: &[Capability]) -> usize {
        required
            .iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter(|c| self.capabilities.contains(c))
            .count()
    }

    /// Mean of the performance history, `0.0` when there is none.
    pub fn average_performance(&self) -> f64 {
        if self.performance_history.is_empty() {
            0.0
        } else {
            self.performance_history.iter().sum::<f64>() / self.performance_history.len() as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_id_system() {
        assert!(AgentId::system().is_system());
        assert!(!AgentId::new("writer-1").is_system());
        assert_ne!(AgentId::generate(), AgentId::generate());
    }

    #[test]
    fn test_agent_id_ordering() {
        let mut ids = vec![AgentId::new("c"), AgentId::new("a"), AgentId::new("b")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "a");
    }

    #[test]
    fn test_capability_overlap_counts_distinct() {
        let profile = AgentProfile::new("a", "Alice")
            .with_capabilities([Capability::Writing, Capability::Reviewing]);

        assert_eq!(profile.capability_overlap(&[Capability::Writing]), 1);
        assert_eq!(
            profile.capability_overlap(&[Capability::Writing, Capability::Writing]),
            1
        );
        assert_eq!(
            profile.capability_overlap(&[Capability::Writing, Capability::Reviewing, Capability::Coding]),
            2
        );
        assert_eq!(profile.capability_overlap(&[]), 0);
    }

    #[test]
    fn test_average_performance() {
        let profile = AgentProfile::new("a", "Alice").with_performance([0.5, 1.0, 1.7]);
        assert_eq!(profile.performance_history, vec![0.5, 1.0, 1.0]);
        assert!((profile.average_performance() - 2.5 / 3.0).abs() < 1e-9);
        assert_eq!(AgentProfile::new("b", "Bob").average_performance(), 0.0);
    }
}
