//! Aggregate collaboration metrics.
//!
//! Sessions leave the active registry when they finish; their footprint
//! survives only here.

use super::outcome::{Outcome, OutcomeStatus};
use super::protocol::ProtocolKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Per-protocol counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolStats {
    pub sessions: u64,
    pub completed: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollaborationMetrics {
    pub sessions_started: u64,
    pub sessions_completed: u64,
    pub sessions_failed: u64,
    pub sessions_not_implemented: u64,
    pub per_protocol: BTreeMap<ProtocolKind, ProtocolStats>,
    pub allocations: u64,
    pub negotiations_started: u64,
    pub negotiations_reached: u64,
    total_session_millis: u64,
    finished_sessions: u64,
}

impl CollaborationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_session_started(&mut self, protocol: ProtocolKind) {
        self.sessions_started += 1;
        self.per_protocol.entry(protocol).or_default().sessions += 1;
    }

    /// Account for a finished session.
    pub fn record_outcome(&mut self, outcome: &Outcome, elapsed: Duration) {
        let stats = self.per_protocol.entry(outcome.protocol).or_default();
        match outcome.status {
            OutcomeStatus::Completed => {
                self.sessions_completed += 1;
                stats.completed += 1;
            }
            OutcomeStatus::Failed => {
                self.sessions_failed += 1;
                stats.failed += 1;
            }
            OutcomeStatus::NotImplemented => self.sessions_not_implemented += 1,
            OutcomeStatus::Allocated => {}
        }
        self.finished_sessions += 1;
        self.total_session_millis = self
            .total_session_millis
            .saturating_add(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
    }

    pub fn record_allocation(&mut self) {
        self.allocations += 1;
    }

    pub fn record_negotiation(&mut self, reached: bool) {
        self.negotiations_started += 1;
        if reached {
            self.negotiations_reached += 1;
        }
    }

    /// Mean wall-clock duration of finished sessions.
    pub fn average_session_duration(&self) -> Option<Duration> {
        (self.finished_sessions > 0)
            .then(|| Duration::from_millis(self.total_session_millis / self.finished_sessions))
    }

    /// Fraction of finished sessions that completed.
    pub fn success_rate(&self) -> f64 {
        if self.finished_sessions == 0 {
            0.0
        } else {
            self.sessions_completed as f64 / self.finished_sessions as f64
        }
    }
}
