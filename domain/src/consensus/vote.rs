//! Vote types for consensus negotiation
//!
//! This module defines the voting primitives used once a candidate decision
//! has emerged from the proposal rounds.

use crate::agent::AgentId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A participant's answer to a vote query.
///
/// # Example
///
/// ```
/// use concord_domain::consensus::VoteChoice;
///
/// assert_eq!(VoteChoice::from_value(&serde_json::json!("accept")), Some(VoteChoice::Accept));
/// assert_eq!(VoteChoice::from_value(&serde_json::json!(false)), Some(VoteChoice::Reject));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    Accept,
    Reject,
    Abstain,
}

impl VoteChoice {
    /// Interpret a reply payload field as a vote.
    ///
    /// Accepts the canonical names plus a few common synonyms and booleans.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(true) => Some(VoteChoice::Accept),
            Value::Bool(false) => Some(VoteChoice::Reject),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VoteChoice::Accept => "accept",
            VoteChoice::Reject => "reject",
            VoteChoice::Abstain => "abstain",
        }
    }
}

impl std::fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for VoteChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "accept" | "approve" | "yes" => Ok(VoteChoice::Accept),
            "reject" | "deny" | "no" => Ok(VoteChoice::Reject),
            "abstain" => Ok(VoteChoice::Abstain),
            other => Err(format!(
                "Unknown vote: {}. Valid: accept, reject, abstain",
                other
            )),
        }
    }
}

/// Aggregated view of a vote round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoteTally {
    pub accept_count: usize,
    pub reject_count: usize,
    pub abstain_count: usize,
    /// Number of agents asked to vote, including those that never answered.
    pub participant_count: usize,
}

impl VoteTally {
    pub fn from_votes(votes: &BTreeMap<AgentId, VoteChoice>, participant_count: usize) -> Self {
        let count = |choice: VoteChoice| votes.values().filter(|v| **v == choice).count();
        Self {
            accept_count: count(VoteChoice::Accept),
            reject_count: count(VoteChoice::Reject),
            abstain_count: count(VoteChoice::Abstain),
            participant_count: participant_count.max(votes.len()),
        }
    }

    /// Accepts over participants, in `[0, 1]`.
    pub fn agreement(&self) -> f64 {
        if self.participant_count == 0 {
            0.0
        } else {
            (self.accept_count as f64 / self.participant_count as f64).clamp(0.0, 1.0)
        }
    }

    /// Participants that never answered.
    pub fn missing(&self) -> usize {
        self.participant_count
            .saturating_sub(self.accept_count + self.reject_count + self.abstain_count)
    }

    /// Visual summary: `●` accept, `○` reject, `◌` abstain, `·` missing.
    pub fn summary(&self) -> String {
        let mut summary = String::from("[");
        summary.extend(std::iter::repeat_n('●', self.accept_count));
        summary.extend(std::iter::repeat_n('○', self.reject_count));
        summary.extend(std::iter::repeat_n('◌', self.abstain_count));
        summary.extend(std::iter::repeat_n('·', self.missing()));
        summary.push(']');
        summary
    }
}
