//! Collaboration orchestration domain
//!
//! Protocol kinds, sessions and the tagged results the orchestrator hands
//! back to callers. The orchestration loop itself lives in the application
//! layer.

pub mod metrics;
pub mod outcome;
pub mod protocol;
pub mod session;

pub use metrics::{CollaborationMetrics, ProtocolStats};
pub use outcome::{AllocationResult, Assignment, Outcome, OutcomeStatus};
pub use protocol::ProtocolKind;
pub use session::{CollaborationSession, SessionId, SessionStatus};
