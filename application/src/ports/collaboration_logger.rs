//! Port for structured collaboration logging.
//!
//! Defines the [`CollaborationLogger`] trait for recording collaboration
//! events (sessions, negotiation rounds, allocations) to a structured log.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostics, while this port captures a machine-readable
//! transcript (JSONL).

use serde_json::Value;

/// A structured collaboration event.
pub struct CollaborationEvent {
    /// Event type identifier (e.g., "session_started", "consensus_round").
    pub event_type: &'static str,
    /// JSON payload with event-specific data.
    pub payload: Value,
}

impl CollaborationEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }
}

/// Port for logging collaboration events.
///
/// `log` is synchronous and infallible; implementations swallow their own
/// write failures.
pub trait CollaborationLogger: Send + Sync {
    fn log(&self, event: CollaborationEvent);
}

/// No-op implementation for tests and when logging is disabled.
pub struct NoCollaborationLogger;

impl CollaborationLogger for NoCollaborationLogger {
    fn log(&self, _event: CollaborationEvent) {}
}
