//! Application layer for concord
//!
//! This crate contains the message bus, the agent runtime, the collaboration
//! protocols, the negotiation use case and the orchestrator that ties them
//! together. It depends only on the domain layer.

pub mod agents;
pub mod bus;
pub mod config;
pub mod orchestrator;
pub mod ports;
pub mod protocols;
pub mod runtime;
pub mod shared_workspace;
pub mod use_cases;

pub(crate) mod sync;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use agents::{Recorder, ScriptedAgent};
pub use bus::{BusError, MessageBus};
pub use config::CollaborationParams;
pub use orchestrator::{CollaborationOrchestrator, OrchestratorError};
pub use ports::{
    agent::{Agent, AgentReply},
    collaboration_logger::{CollaborationEvent, CollaborationLogger, NoCollaborationLogger},
};
pub use protocols::{
    Messenger, ProtocolContext, ProtocolError, ProtocolHandler, ProtocolRegistry, SubtaskReport,
    SubtaskStatus,
};
pub use runtime::{AgentHandle, AgentRuntime};
pub use shared_workspace::SharedWorkspace;
pub use use_cases::negotiate_consensus::{NegotiateConsensusInput, NegotiateConsensusUseCase};
