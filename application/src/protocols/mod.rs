//! Collaboration protocols
//!
//! Each [`ProtocolKind`] has one [`ProtocolHandler`]; the
//! [`ProtocolRegistry`] maps kinds to handlers. Adding a protocol means one
//! enum variant and one implementation, with no change to the orchestrator.
//!
//! | Protocol | Shape |
//! |----------|-------|
//! | [`HierarchicalProtocol`] | leader plans, workers execute, leader synthesizes |
//! | [`PeerToPeerProtocol`] | everyone solves, everyone reviews, results merged |
//! | [`BlackboardProtocol`] | rounds of contributions to a locked shared board |
//! | [`ContractNetProtocol`] | call for proposals, cheapest bid wins the subtask |
//! | [`SwarmProtocol`] | independent solutions, weighted by track record |
//! | [`ConsensusProtocol`] | multi-round negotiation until agreement |

pub mod blackboard;
pub mod consensus;
pub mod contract_net;
pub mod dispatch;
pub mod hierarchical;
pub mod messenger;
pub mod peer_to_peer;
pub mod swarm;

pub use blackboard::BlackboardProtocol;
pub use consensus::ConsensusProtocol;
pub use contract_net::ContractNetProtocol;
pub use dispatch::{SubtaskReport, SubtaskStatus};
pub use hierarchical::{HierarchicalPhase, HierarchicalProtocol};
pub use messenger::{Messenger, reply_result};
pub use peer_to_peer::PeerToPeerProtocol;
pub use swarm::{DEFAULT_SWARM_WEIGHT, SwarmProtocol};

use crate::bus::BusError;
use crate::config::CollaborationParams;
use crate::ports::collaboration_logger::{CollaborationLogger, NoCollaborationLogger};
use async_trait::async_trait;
use concord_domain::{AgentId, AgentProfile, DomainError, Outcome, ProtocolKind, SessionId, Task};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Faults inside a protocol run. The orchestrator turns them into failed
/// outcomes; timeouts are never errors.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("No participating agents")]
    NoParticipants,

    #[error("Invalid agent reply: {0}")]
    InvalidReply(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Everything a handler needs besides the task itself.
#[derive(Clone)]
pub struct ProtocolContext {
    pub messenger: Messenger,
    pub params: CollaborationParams,
    pub logger: Arc<dyn CollaborationLogger>,
}

impl ProtocolContext {
    pub fn new(messenger: Messenger, params: CollaborationParams) -> Self {
        Self {
            messenger,
            params,
            logger: Arc::new(NoCollaborationLogger),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn CollaborationLogger>) -> Self {
        self.logger = logger;
        self
    }
}

/// One coordination strategy.
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    fn kind(&self) -> ProtocolKind;

    /// Run `task` with `agents` under collaboration id `collaboration_id`.
    ///
    /// `Outcome` statuses carry the result, including `not_implemented`;
    /// `Err` is reserved for faults.
    async fn execute(
        &self,
        ctx: &ProtocolContext,
        collaboration_id: &SessionId,
        task: &Task,
        agents: &[AgentProfile],
    ) -> Result<Outcome, ProtocolError>;
}

/// Ids of `agents`, in order.
pub(crate) fn agent_ids(agents: &[AgentProfile]) -> Vec<AgentId> {
    agents.iter().map(|a| a.id.clone()).collect()
}

/// Handler lookup by protocol kind.
#[derive(Clone, Default)]
pub struct ProtocolRegistry {
    handlers: HashMap<ProtocolKind, Arc<dyn ProtocolHandler>>,
}

impl ProtocolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in protocol.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(HierarchicalProtocol));
        registry.register(Arc::new(PeerToPeerProtocol));
        registry.register(Arc::new(BlackboardProtocol));
        registry.register(Arc::new(ContractNetProtocol));
        registry.register(Arc::new(SwarmProtocol));
        registry.register(Arc::new(ConsensusProtocol));
        registry
    }

    /// Register `handler` under its own kind, returning the handler it
    /// replaced.
    pub fn register(&mut self, handler: Arc<dyn ProtocolHandler>) -> Option<Arc<dyn ProtocolHandler>> {
        self.handlers.insert(handler.kind(), handler)
    }

    pub fn remove(&mut self, kind: ProtocolKind) -> Option<Arc<dyn ProtocolHandler>> {
        self.handlers.remove(&kind)
    }

    pub fn get(&self, kind: ProtocolKind) -> Option<Arc<dyn ProtocolHandler>> {
        self.handlers.get(&kind).cloned()
    }

    pub fn contains(&self, kind: ProtocolKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<ProtocolKind> {
        let mut kinds: Vec<_> = self.handlers.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Placeholder;

    #[async_trait]
    impl ProtocolHandler for Placeholder {
        fn kind(&self) -> ProtocolKind {
            ProtocolKind::Swarm
        }

        async fn execute(
            &self,
            _ctx: &ProtocolContext,
            collaboration_id: &SessionId,
            _task: &Task,
            _agents: &[AgentProfile],
        ) -> Result<Outcome, ProtocolError> {
            Ok(Outcome::not_implemented(collaboration_id.clone(), self.kind()))
        }
    }

    #[test]
    fn test_defaults_cover_every_kind() {
        let registry = ProtocolRegistry::with_defaults();
        assert_eq!(registry.kinds(), ProtocolKind::ALL.to_vec());
    }

    #[test]
    fn test_register_replaces_by_kind() {
        let mut registry = ProtocolRegistry::with_defaults();
        assert!(registry.register(Arc::new(Placeholder)).is_some());
        assert_eq!(registry.kinds().len(), 6);

        registry.remove(ProtocolKind::Swarm);
        assert!(!registry.contains(ProtocolKind::Swarm));
        assert!(registry.get(ProtocolKind::Swarm).is_none());
    }

    #[test]
    fn test_error_display() {
        let err = ProtocolError::from(DomainError::DependencyCycle("a, b".to_string()));
        assert_eq!(err.to_string(), "Dependency cycle detected among subtasks: a, b");
    }
}
