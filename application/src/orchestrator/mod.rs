//! Collaboration orchestrator
//!
//! - [`CollaborationOrchestrator`] - agents, workspaces, sessions, metrics
//! - [`OrchestratorError`] - registry errors

pub mod collaboration;
pub mod error;

pub use collaboration::CollaborationOrchestrator;
pub use error::OrchestratorError;
