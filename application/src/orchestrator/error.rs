use concord_domain::{AgentId, DomainError, WorkspaceId};
use thiserror::Error;

/// Errors from the orchestrator's registry operations.
///
/// Task entry points never return these; they report failures as tagged
/// outcomes instead.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Unknown agent: {0}")]
    UnknownAgent(AgentId),

    #[error("Agent already registered: {0}")]
    DuplicateAgent(AgentId),

    #[error("Agent id is reserved for the coordinator: {0}")]
    ReservedAgentId(AgentId),

    #[error("Unknown workspace: {0}")]
    UnknownWorkspace(WorkspaceId),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl OrchestratorError {
    pub fn is_not_found(&self) -> bool {
        match self {
            OrchestratorError::UnknownAgent(_) | OrchestratorError::UnknownWorkspace(_) => true,
            OrchestratorError::Domain(e) => e.is_not_found(),
            _ => false,
        }
    }
}
