//! Collaboration protocol kinds.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordination strategy used to run a collaboration.
///
/// Each variant maps to exactly one handler in the application layer's
/// protocol registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    /// Leader plans, workers execute, leader synthesizes
    #[default]
    Hierarchical,
    /// Every peer solves, then reviews the others
    PeerToPeer,
    /// Contributions accumulate on a shared blackboard
    Blackboard,
    /// Call for proposals, bids, award
    ContractNet,
    /// Independent solutions merged by weighted voting
    Swarm,
    /// Multi-round negotiation until agreement
    Consensus,
}

impl ProtocolKind {
    pub const ALL: [ProtocolKind; 6] = [
        ProtocolKind::Hierarchical,
        ProtocolKind::PeerToPeer,
        ProtocolKind::Blackboard,
        ProtocolKind::ContractNet,
        ProtocolKind::Swarm,
        ProtocolKind::Consensus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolKind::Hierarchical => "hierarchical",
            ProtocolKind::PeerToPeer => "peer_to_peer",
            ProtocolKind::Blackboard => "blackboard",
            ProtocolKind::ContractNet => "contract_net",
            ProtocolKind::Swarm => "swarm",
            ProtocolKind::Consensus => "consensus",
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProtocolKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "hierarchical" => Ok(ProtocolKind::Hierarchical),
            "peer_to_peer" | "p2p" => Ok(ProtocolKind::PeerToPeer),
            "blackboard" => Ok(ProtocolKind::Blackboard),
            "contract_net" => Ok(ProtocolKind::ContractNet),
            "swarm" => Ok(ProtocolKind::Swarm),
            "consensus" => Ok(ProtocolKind::Consensus),
            _ => Err(DomainError::InvalidProtocol(s.to_string())),
        }
    }
}
