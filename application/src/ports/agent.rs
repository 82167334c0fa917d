//! Agent port
//!
//! Agents are external collaborators: their reasoning is opaque to the
//! engine, which only sees a profile and an asynchronous message handler.
//! The [`AgentRuntime`](crate::runtime::AgentRuntime) drives an agent's
//! inbox and turns its replies into bus messages.

use async_trait::async_trait;
use concord_domain::{AgentProfile, Message, MessageKind};
use serde_json::Value;

/// An agent's answer to one message.
///
/// The runtime wraps it with [`Message::reply`], so the conversation id of
/// the request is echoed by construction.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    pub kind: MessageKind,
    pub payload: Value,
}

impl AgentReply {
    pub fn new(kind: MessageKind, payload: Value) -> Self {
        Self { kind, payload }
    }

    /// A plain [`MessageKind::Response`].
    pub fn response(payload: Value) -> Self {
        Self::new(MessageKind::Response, payload)
    }
}

/// A participant in collaborations.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Identity, capabilities, performance and memory. Read again whenever
    /// agents are listed or selected, so changes show up in the next
    /// session. The id is fixed at registration.
    fn profile(&self) -> AgentProfile;

    /// Handle one inbound message. `None` means no reply.
    async fn handle(&self, message: &Message) -> Option<AgentReply>;
}
