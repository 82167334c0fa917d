//! Message envelope exchanged between agents and the engine.

use crate::agent::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Correlation token linking a request to its replies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
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

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a message is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Generic request; the `action` payload field says what is asked.
    Request,
    /// Generic reply to a request.
    Response,
    /// One-way notification, no reply expected.
    Inform,
    /// A subtask handed to an agent.
    TaskAssignment,
    /// Result of an assigned subtask.
    TaskResult,
    /// Consensus proposal (request and reply).
    Propose,
    /// Consensus vote (request and reply).
    Vote,
    /// Contract-net call for proposals.
    CallForProposals,
    /// Contract-net bid.
    Bid,
    /// Contract-net award of a subtask to the winning bidder.
    Award,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Request => "request",
            MessageKind::Response => "response",
            MessageKind::Inform => "inform",
            MessageKind::TaskAssignment => "task_assignment",
            MessageKind::TaskResult => "task_result",
            MessageKind::Propose => "propose",
            MessageKind::Vote => "vote",
            MessageKind::CallForProposals => "call_for_proposals",
            MessageKind::Bid => "bid",
            MessageKind::Award => "award",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Delivery priority hint. Queues stay FIFO; priority is informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagePriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// Immutable message envelope.
///
/// # Example
///
/// ```
/// use concord_domain::message::{Message, MessageKind};
/// use concord_domain::AgentId;
///
/// let request = Message::new(AgentId::system(), MessageKind::Request, serde_json::json!({"action": "plan"}))
///     .to(AgentId::new("leader"))
///     .expecting_reply();
/// let reply = request.reply(AgentId::new("leader"), MessageKind::Response, serde_json::json!({}));
///
/// assert_eq!(reply.conversation_id, request.conversation_id);
/// assert_eq!(reply.recipient, Some(AgentId::system()));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender: AgentId,
    /// `None` means broadcast to every registered agent except the sender.
    pub recipient: Option<AgentId>,
    pub kind: MessageKind,
    pub conversation_id: ConversationId,
    pub payload: Value,
    pub priority: MessagePriority,
    pub response_required: bool,
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a broadcast message in a fresh conversation.
    pub fn new(sender: impl Into<AgentId>, kind: MessageKind, payload: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender: sender.into(),
            recipient: None,
            kind,
            conversation_id: ConversationId::generate(),
            payload,
            priority: MessagePriority::Normal,
            response_required: false,
            deadline: None,
            created_at: Utc::now(),
        }
    }

    pub fn to(mut self, recipient: impl Into<AgentId>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    pub fn in_conversation(mut self, conversation_id: ConversationId) -> Self {
        self.conversation_id = conversation_id;
        self
    }

    pub fn with_priority(mut self, priority: MessagePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn expecting_reply(mut self) -> Self {
        self.response_required = true;
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set the deadline `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = chrono::Duration::from_std(timeout)
            .ok()
            .and_then(|d| self.created_at.checked_add_signed(d));
        self
    }

    /// Build a reply from `sender` in the same conversation, addressed to
    /// this message's sender.
    pub fn reply(&self, sender: impl Into<AgentId>, kind: MessageKind, payload: Value) -> Message {
        Message {
            id: uuid::Uuid::new_v4().to_string(),
            sender: sender.into(),
            recipient: Some(self.sender.clone()),
            kind,
            conversation_id: self.conversation_id.clone(),
            payload,
            priority: self.priority,
            response_required: false,
            deadline: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_broadcast(&self) -> bool {
        self.recipient.is_none()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|deadline| now > deadline)
    }

    /// The `action` field of an object payload, if any.
    pub fn action(&self) -> Option<&str> {
        self.payload.get("action").and_then(Value::as_str)
    }
}
