//! Collaboration parameters: bus, protocol and negotiation control.
//!
//! [`CollaborationParams`] groups the static knobs read by the
//! [`MessageBus`](crate::bus::MessageBus), every protocol handler and the
//! consensus negotiation. These are application-layer concerns, not domain
//! policy; the infrastructure layer fills them from configuration files.

use concord_domain::{DEFAULT_CONSENSUS_THRESHOLD, DEFAULT_FALLBACK_COUNT};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default bound on every agent's inbox.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Timeouts and limits for one orchestrator.
///
/// | Field | Used by |
/// |-------|---------|
/// | `queue_capacity` | message bus |
/// | `request_timeout` | peer-to-peer, blackboard, contract-net bids, swarm |
/// | `plan_timeout` / `synthesis_timeout` | hierarchical leader |
/// | `subtask_timeout` | hierarchical and contract-net execution |
/// | `round_timeout` / `vote_timeout` | consensus negotiation |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaborationParams {
    /// Messages kept per inbox before the oldest is dropped.
    pub queue_capacity: usize,
    /// Generic request/reply wait.
    pub request_timeout: Duration,
    /// Wait for the hierarchical leader's plan.
    pub plan_timeout: Duration,
    /// Wait for each dispatched subtask result.
    pub subtask_timeout: Duration,
    /// Wait for the hierarchical leader's synthesis.
    pub synthesis_timeout: Duration,
    /// Proposal collection per negotiation round.
    pub round_timeout: Duration,
    /// Vote collection once a proposal wins.
    pub vote_timeout: Duration,
    /// Share of identical proposals needed for consensus.
    pub consensus_threshold: f64,
    /// Negotiation round limit.
    pub max_rounds: usize,
    /// Agents selected when nobody matches a task's capabilities.
    pub fallback_agent_count: usize,
    /// Blackboard contribution rounds.
    pub blackboard_rounds: usize,
}

impl Default for CollaborationParams {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            request_timeout: Duration::from_secs(30),
            plan_timeout: Duration::from_secs(30),
            subtask_timeout: Duration::from_secs(60),
            synthesis_timeout: Duration::from_secs(30),
            round_timeout: Duration::from_secs(30),
            vote_timeout: Duration::from_secs(15),
            consensus_threshold: DEFAULT_CONSENSUS_THRESHOLD,
            max_rounds: 10,
            fallback_agent_count: DEFAULT_FALLBACK_COUNT,
            blackboard_rounds: 3,
        }
    }
}

impl CollaborationParams {
    // ==================== Builder Methods ====================

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_plan_timeout(mut self, timeout: Duration) -> Self {
        self.plan_timeout = timeout;
        self
    }

    pub fn with_subtask_timeout(mut self, timeout: Duration) -> Self {
        self.subtask_timeout = timeout;
        self
    }

    pub fn with_synthesis_timeout(mut self, timeout: Duration) -> Self {
        self.synthesis_timeout = timeout;
        self
    }

    pub fn with_round_timeout(mut self, timeout: Duration) -> Self {
        self.round_timeout = timeout;
        self
    }

    pub fn with_vote_timeout(mut self, timeout: Duration) -> Self {
        self.vote_timeout = timeout;
        self
    }

    /// Clamped to `(0, 1]`; non-finite values keep the current threshold.
    pub fn with_consensus_threshold(mut self, threshold: f64) -> Self {
        if threshold.is_finite() {
            self.consensus_threshold = threshold.clamp(f64::EPSILON, 1.0);
        }
        self
    }

    pub fn with_max_rounds(mut self, rounds: usize) -> Self {
        self.max_rounds = rounds;
        self
    }

    pub fn with_fallback_agent_count(mut self, count: usize) -> Self {
        self.fallback_agent_count = count;
        self
    }

    pub fn with_blackboard_rounds(mut self, rounds: usize) -> Self {
        self.blackboard_rounds = rounds;
        self
    }

    /// Every wait set to `timeout`. Handy for tests.
    pub fn with_uniform_timeout(self, timeout: Duration) -> Self {
        self.with_request_timeout(timeout)
            .with_plan_timeout(timeout)
            .with_subtask_timeout(timeout)
            .with_synthesis_timeout(timeout)
            .with_round_timeout(timeout)
            .with_vote_timeout(timeout)
    }
}
