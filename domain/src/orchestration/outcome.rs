//! Tagged results returned by the orchestrator.
//!
//! - [`Outcome`] - Result of running a collaboration protocol
//! - [`AllocationResult`] - Result of planning who does which subtask

use super::protocol::ProtocolKind;
use super::session::SessionId;
use crate::agent::AgentId;
use crate::task::TaskId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Terminal status of an orchestrator entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Completed,
    Failed,
    /// The protocol slot exists but has no behavior.
    NotImplemented,
    Allocated,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Completed => "completed",
            OutcomeStatus::Failed => "failed",
            OutcomeStatus::NotImplemented => "not_implemented",
            OutcomeStatus::Allocated => "allocated",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of one collaboration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub collaboration_id: SessionId,
    pub protocol: ProtocolKind,
    pub status: OutcomeStatus,
    /// Per-participant (or per-subtask) results, keyed by id
    #[serde(default)]
    pub agent_results: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Outcome {
    fn with_status(collaboration_id: SessionId, protocol: ProtocolKind, status: OutcomeStatus) -> Self {
        Self {
            collaboration_id,
            protocol,
            status,
            agent_results: BTreeMap::new(),
            result: None,
            reason: None,
        }
    }

    pub fn completed(collaboration_id: SessionId, protocol: ProtocolKind, result: Value) -> Self {
        let mut outcome = Self::with_status(collaboration_id, protocol, OutcomeStatus::Completed);
        outcome.result = Some(result);
        outcome
    }

    pub fn failed(collaboration_id: SessionId, protocol: ProtocolKind, reason: impl Into<String>) -> Self {
        let mut outcome = Self::with_status(collaboration_id, protocol, OutcomeStatus::Failed);
        outcome.reason = Some(reason.into());
        outcome
    }

    pub fn not_implemented(collaboration_id: SessionId, protocol: ProtocolKind) -> Self {
        let mut outcome = Self::with_status(collaboration_id, protocol, OutcomeStatus::NotImplemented);
        outcome.reason = Some(format!("protocol {} is not implemented", protocol));
        outcome
    }

    pub fn with_agent_results(mut self, results: BTreeMap<String, Value>) -> Self {
        self.agent_results = results;
        self
    }

    pub fn with_agent_result(mut self, key: impl Into<String>, result: Value) -> Self {
        self.agent_results.insert(key.into(), result);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status == OutcomeStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == OutcomeStatus::Failed
    }
}

/// One subtask given to one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub subtask: TaskId,
    pub agent: AgentId,
    /// How many of the subtask's required capabilities the agent covers
    pub overlap: usize,
}

/// Result of `allocate_task`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub status: OutcomeStatus,
    pub session_id: SessionId,
    pub protocol: ProtocolKind,
    pub selected_agents: Vec<AgentId>,
    pub assignments: Vec<Assignment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AllocationResult {
    pub fn allocated(
        session_id: SessionId,
        protocol: ProtocolKind,
        selected_agents: Vec<AgentId>,
        assignments: Vec<Assignment>,
    ) -> Self {
        Self {
            status: OutcomeStatus::Allocated,
            session_id,
            protocol,
            selected_agents,
            assignments,
            reason: None,
        }
    }

    pub fn failed(session_id: SessionId, protocol: ProtocolKind, reason: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Failed,
            session_id,
            protocol,
            selected_agents: Vec::new(),
            assignments: Vec::new(),
            reason: Some(reason.into()),
        }
    }

    /// Subtasks assigned to `agent`.
    pub fn assignments_for(&self, agent: &AgentId) -> Vec<&TaskId> {
        self.assignments
            .iter()
            .filter(|a| &a.agent == agent)
            .map(|a| &a.subtask)
            .collect()
    }
}
