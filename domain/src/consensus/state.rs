//! Negotiation state and results
//!
//! [`ConsensusState`] is the mutable record of one negotiation in progress;
//! [`ConsensusResult`] is what callers get back once it ends.

use super::builder::ConsensusCheck;
use super::vote::{VoteChoice, VoteTally};
use crate::agent::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Summary of one proposal round, kept for auditing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    /// Round number (1-indexed)
    pub round: usize,
    /// Number of participants that answered with a proposal
    pub proposals_received: usize,
    pub check: ConsensusCheck,
    pub timestamp: DateTime<Utc>,
}

/// Mutable state of a negotiation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsensusState {
    pub round: usize,
    pub proposals: BTreeMap<AgentId, Value>,
    pub votes: BTreeMap<AgentId, VoteChoice>,
    pub decision: Option<Value>,
    agreement_level: f64,
    pub history: Vec<RoundSummary>,
}

impl ConsensusState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to the next round, discarding the previous round's proposals.
    ///
    /// Returns the discarded proposals so they can be shown to participants.
    pub fn begin_round(&mut self) -> BTreeMap<AgentId, Value> {
        self.round += 1;
        std::mem::take(&mut self.proposals)
    }

    pub fn record_proposal(&mut self, agent: AgentId, proposal: Value) {
        self.proposals.insert(agent, proposal);
    }

    pub fn record_vote(&mut self, agent: AgentId, vote: VoteChoice) {
        self.votes.insert(agent, vote);
    }

    /// Record the consensus check of the current round.
    pub fn record_check(&mut self, check: ConsensusCheck) {
        self.history.push(RoundSummary {
            round: self.round,
            proposals_received: self.proposals.len(),
            check,
            timestamp: Utc::now(),
        });
    }

    pub fn set_decision(&mut self, decision: Value) {
        self.decision = Some(decision);
    }

    /// Set the agreement level, clamped to `[0, 1]`.
    pub fn set_agreement_level(&mut self, level: f64) {
        self.agreement_level = if level.is_nan() {
            0.0
        } else {
            level.clamp(0.0, 1.0)
        };
    }

    pub fn agreement_level(&self) -> f64 {
        self.agreement_level
    }

    /// True iff a decision exists and more than half agreed to it.
    pub fn consensus_reached(&self) -> bool {
        self.decision.is_some() && self.agreement_level > 0.5
    }

    pub fn tally(&self, participant_count: usize) -> VoteTally {
        VoteTally::from_votes(&self.votes, participant_count)
    }
}

/// Final outcome of a negotiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub decision: Option<Value>,
    pub agreement_level: f64,
    /// Derived: `decision.is_some() && agreement_level > 0.5`.
    pub consensus_reached: bool,
    pub votes: BTreeMap<AgentId, VoteChoice>,
    pub proposals: BTreeMap<AgentId, Value>,
    /// Number of proposal rounds run.
    pub rounds: usize,
    pub history: Vec<RoundSummary>,
}

impl ConsensusResult {
    /// Freeze a negotiation state into a result.
    pub fn from_state(state: ConsensusState) -> Self {
        let consensus_reached = state.consensus_reached();
        Self {
            agreement_level: state.agreement_level,
            consensus_reached,
            decision: state.decision,
            votes: state.votes,
            proposals: state.proposals,
            rounds: state.round,
            history: state.history,
        }
    }

    /// No decision after `rounds` rounds.
    pub fn undecided(rounds: usize, state: ConsensusState) -> Self {
        Self {
            decision: None,
            agreement_level: 0.0,
            consensus_reached: false,
            votes: BTreeMap::new(),
            proposals: state.proposals,
            rounds,
            history: state.history,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_agreement_level_is_clamped() {
        let mut state = ConsensusState::new();
        state.set_agreement_level(1.7);
        assert_eq!(state.agreement_level(), 1.0);
        state.set_agreement_level(-0.2);
        assert_eq!(state.agreement_level(), 0.0);
        state.set_agreement_level(f64::NAN);
        assert_eq!(state.agreement_level(), 0.0);
    }

    #[test]
    fn test_consensus_reached_requires_decision_and_majority() {
        let mut state = ConsensusState::new();
        state.set_agreement_level(0.9);
        assert!(!state.consensus_reached());

        state.set_decision(json!("A"));
        assert!(state.consensus_reached());

        state.set_agreement_level(0.5);
        assert!(!state.consensus_reached());
    }

    #[test]
    fn test_begin_round_returns_previous_proposals() {
        let mut state = ConsensusState::new();
        assert!(state.begin_round().is_empty());
        state.record_proposal(AgentId::new("a"), json!(1));
        let previous = state.begin_round();
        assert_eq!(state.round, 2);
        assert_eq!(previous.len(), 1);
        assert!(state.proposals.is_empty());
    }

    #[test]
    fn test_result_from_state() {
        let mut state = ConsensusState::new();
        state.begin_round();
        state.record_proposal(AgentId::new("a"), json!("A"));
        state.record_vote(AgentId::new("a"), VoteChoice::Accept);
        state.set_decision(json!("A"));
        state.set_agreement_level(1.0);

        let result = ConsensusResult::from_state(state);
        assert!(result.consensus_reached);
        assert_eq!(result.rounds, 1);
        assert_eq!(result.votes.len(), 1);
    }

    #[test]
    fn test_undecided_result() {
        let result = ConsensusResult::undecided(10, ConsensusState::new());
        assert!(!result.consensus_reached);
        assert!(result.decision.is_none());
        assert_eq!(result.agreement_level, 0.0);
        assert_eq!(result.rounds, 10);
    }
}
