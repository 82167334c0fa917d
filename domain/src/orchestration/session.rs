//! Collaboration sessions.

use super::protocol::ProtocolKind;
use crate::agent::AgentId;
use crate::task::{Task, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a collaboration session.
///
/// Doubles as the collaboration id passed to protocol handlers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Active,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One running collaboration.
///
/// The session drives its task's status: `Active` while it runs, then
/// `Completed` or `Failed` with the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborationSession {
    pub id: SessionId,
    pub task: Task,
    pub protocol: ProtocolKind,
    pub participants: Vec<AgentId>,
    pub started_at: DateTime<Utc>,
    pub status: SessionStatus,
}

impl CollaborationSession {
    pub fn new(mut task: Task, protocol: ProtocolKind, participants: Vec<AgentId>) -> Self {
        task.set_status(TaskStatus::Active);
        Self {
            id: SessionId::generate(),
            task,
            protocol,
            participants,
            started_at: Utc::now(),
            status: SessionStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Move out of `Active`. Finishing twice keeps the first status.
    pub fn finish(&mut self, status: SessionStatus) {
        if self.is_active() {
            self.status = status;
            self.task.set_status(match status {
                SessionStatus::Active => TaskStatus::Active,
                SessionStatus::Completed => TaskStatus::Completed,
                SessionStatus::Failed => TaskStatus::Failed,
            });
        }
    }

    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_is_one_way() {
        let mut session = CollaborationSession::new(
            Task::new("t", "write report"),
            ProtocolKind::Hierarchical,
            vec![AgentId::new("a")],
        );
        assert!(session.is_active());

        session.finish(SessionStatus::Failed);
        session.finish(SessionStatus::Completed);
        assert_eq!(session.status, SessionStatus::Failed);
        assert_eq!(session.task.status, TaskStatus::Failed);
    }

    #[test]
    fn test_task_status_follows_session() {
        let task = Task::new("t", "write report");
        assert_eq!(task.status, TaskStatus::Pending);

        let mut session = CollaborationSession::new(task, ProtocolKind::Swarm, vec![AgentId::new("a")]);
        assert_eq!(session.task.status, TaskStatus::Active);

        session.finish(SessionStatus::Completed);
        assert_eq!(session.task.status, TaskStatus::Completed);
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }
}
