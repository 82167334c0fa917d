//! Domain layer for concord
//!
//! This crate contains the core types and pure algorithms of the
//! collaboration engine. It has no dependencies on async runtimes,
//! infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Agents
//!
//! Agents are external collaborators. The domain only knows an agent's
//! [`AgentProfile`] (capabilities, performance history, memory size) and how
//! to match profiles against tasks ([`select_agents`], [`select_leader`]).
//!
//! ## Tasks
//!
//! A [`Task`] decomposes into subtasks ([`decompose`]) whose dependencies form
//! an acyclic graph, scheduled in waves by [`DependencyScheduler`].
//!
//! ## Consensus
//!
//! Stateless agreement detection and compromise synthesis
//! ([`check_consensus`], [`find_compromise`], [`weighted_voting`]) plus the
//! round-by-round [`ConsensusState`] of a negotiation.
//!
//! ## Workspace
//!
//! A [`Workspace`] is shared key/value state with per-resource locks and an
//! append-only audit history.

pub mod agent;
pub mod consensus;
pub mod core;
pub mod message;
pub mod orchestration;
pub mod task;
pub mod workspace;

// Re-export commonly used types
pub use agent::{
    AgentId, AgentProfile, Capability, DEFAULT_FALLBACK_COUNT, best_assignee, leader_score,
    select_agents, select_leader,
};
pub use consensus::{
    AgreementMatrix, ConsensusCheck, ConsensusResult, ConsensusState, DEFAULT_CONSENSUS_THRESHOLD,
    RoundSummary, VoteChoice, VoteTally, WeightedVote, check_consensus, find_compromise,
    pairwise_agreement_matrix, weighted_voting,
};
pub use core::error::DomainError;
pub use message::{ConversationId, Message, MessageKind, MessagePriority};
pub use orchestration::{
    AllocationResult, Assignment, CollaborationMetrics, CollaborationSession, Outcome,
    OutcomeStatus, ProtocolKind, ProtocolStats, SessionId, SessionStatus,
};
pub use task::{DependencyScheduler, Task, TaskId, TaskStatus, decompose};
pub use workspace::{HistoryEntry, Workspace, WorkspaceAction, WorkspaceId, WorkspaceSnapshot};
