//! Request/reply primitives shared by every protocol.
//!
//! The engine talks to agents from a single coordinator mailbox
//! ([`AgentId::system`]). Requests carry a conversation id; replies land in
//! the coordinator mailbox and are matched back by conversation id and
//! sender. A missing reply is an absent result, never an error. Once a wait
//! times out its conversation is abandoned, so replies arriving later are
//! dropped by the bus rather than left in the coordinator mailbox.

use crate::bus::MessageBus;
use concord_domain::{AgentId, ConversationId, Message, MessageKind};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct Messenger {
    bus: Arc<MessageBus>,
    mailbox: AgentId,
}

impl Messenger {
    /// A messenger speaking from the coordinator mailbox. The mailbox is
    /// registered on `bus` if it is not already.
    pub fn new(bus: Arc<MessageBus>) -> Self {
        Self::with_mailbox(bus, AgentId::system())
    }

    pub fn with_mailbox(bus: Arc<MessageBus>, mailbox: AgentId) -> Self {
        bus.register(mailbox.clone());
        Self { bus, mailbox }
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn mailbox(&self) -> &AgentId {
        &self.mailbox
    }

    /// A fresh message from this messenger's mailbox.
    pub fn message(&self, kind: MessageKind, payload: Value) -> Message {
        Message::new(self.mailbox.clone(), kind, payload)
    }

    /// Send `message` to `agent` and wait up to `timeout` for its reply in
    /// the same conversation.
    pub async fn request_and_wait(&self, agent: &AgentId, message: Message, timeout: Duration) -> Option<Message> {
        let deadline = Instant::now() + timeout;
        let message = message.to(agent.clone()).expecting_reply().with_timeout(timeout);
        let conversation = message.conversation_id.clone();

        if let Err(e) = self.bus.send(message) {
            warn!(agent = %agent, "Request not sent: {}", e);
            return None;
        }

        let reply = self
            .bus
            .wait_for(
                &self.mailbox,
                |m| m.conversation_id == conversation && &m.sender == agent,
                deadline,
            )
            .await;
        if reply.is_none() {
            warn!(agent = %agent, conversation = %conversation, "No reply within {:?}", timeout);
            self.bus.abandon_conversation(&self.mailbox, &conversation);
        }
        reply
    }

    /// Send one message per agent in a shared conversation and collect
    /// replies until everyone answered or `timeout` passed.
    ///
    /// The map holds whoever replied in time; it is partial on timeout.
    pub async fn broadcast_and_collect(
        &self,
        agents: &[AgentId],
        kind: MessageKind,
        payload: Value,
        timeout: Duration,
    ) -> BTreeMap<AgentId, Message> {
        let deadline = Instant::now() + timeout;
        let conversation = ConversationId::generate();
        let mut pending = BTreeSet::new();

        for agent in agents {
            let message = self
                .message(kind, payload.clone())
                .to(agent.clone())
                .in_conversation(conversation.clone())
                .expecting_reply()
                .with_timeout(timeout);
            match self.bus.send(message) {
                Ok(_) => {
                    pending.insert(agent.clone());
                }
                Err(e) => warn!(agent = %agent, "Request not sent: {}", e),
            }
        }

        let mut replies = BTreeMap::new();
        while !pending.is_empty() {
            let reply = self
                .bus
                .wait_for(
                    &self.mailbox,
                    |m| m.conversation_id == conversation && pending.contains(&m.sender),
                    deadline,
                )
                .await;
            let Some(reply) = reply else {
                warn!(
                    kind = %kind,
                    missing = ?pending,
                    "Collected {}/{} replies before timeout",
                    replies.len(),
                    replies.len() + pending.len()
                );
                self.bus.abandon_conversation(&self.mailbox, &conversation);
                break;
            };
            pending.remove(&reply.sender);
            replies.insert(reply.sender.clone(), reply);
        }

        debug!(kind = %kind, replies = replies.len(), "Broadcast collected");
        replies
    }

    /// One-way notification to each of `agents`. Returns how many were sent.
    pub fn inform(&self, agents: &[AgentId], kind: MessageKind, payload: Value) -> usize {
        agents
            .iter()
            .filter(|agent| {
                let message = self.message(kind, payload.clone()).to((*agent).clone());
                match self.bus.send(message) {
                    Ok(_) => true,
                    Err(e) => {
                        debug!(agent = %agent, "Notification not sent: {}", e);
                        false
                    }
                }
            })
            .count()
    }
}

/// The useful part of a reply: its `result` field when present, otherwise
/// the whole payload.
pub fn reply_result(message: &Message) -> Value {
    message
        .payload
        .get("result")
        .cloned()
        .unwrap_or_else(|| message.payload.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::ScriptedAgent;
    use crate::ports::agent::Agent;
    use crate::runtime::{AgentHandle, AgentRuntime};
    use concord_domain::AgentProfile;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn spawn(bus: &Arc<MessageBus>, agent: ScriptedAgent) -> AgentHandle {
        bus.register(agent.profile().id);
        AgentRuntime::spawn(Arc::new(agent), Arc::clone(bus), CancellationToken::new())
    }

    fn ids(names: &[&str]) -> Vec<AgentId> {
        names.iter().map(|n| AgentId::new(*n)).collect()
    }

    #[tokio::test]
    async fn test_request_and_wait() {
        let bus = Arc::new(MessageBus::new(100));
        let messenger = Messenger::new(Arc::clone(&bus));
        let _a = spawn(
            &bus,
            ScriptedAgent::new(AgentProfile::new("a", "A")).on(MessageKind::Request, json!({ "result": "done" })),
        );

        let reply = messenger
            .request_and_wait(
                &AgentId::new("a"),
                messenger.message(MessageKind::Request, json!({ "action": "solve" })),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(reply_result(&reply), json!("done"));
    }

    #[tokio::test]
    async fn test_request_to_unknown_agent_is_absent() {
        let bus = Arc::new(MessageBus::new(100));
        let messenger = Messenger::new(bus);
        let reply = messenger
            .request_and_wait(
                &AgentId::new("ghost"),
                messenger.message(MessageKind::Request, json!({})),
                Duration::from_secs(1),
            )
            .await;
        assert!(reply.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_broadcast_collect_is_partial_on_timeout() {
        let bus = Arc::new(MessageBus::new(100));
        let messenger = Messenger::new(Arc::clone(&bus));
        let _fast = spawn(
            &bus,
            ScriptedAgent::new(AgentProfile::new("fast", "Fast")).on(MessageKind::Propose, json!("A")),
        );
        let _slow = spawn(
            &bus,
            ScriptedAgent::new(AgentProfile::new("slow", "Slow"))
                .on(MessageKind::Propose, json!("B"))
                .delay_on(MessageKind::Propose, Duration::from_secs(60)),
        );
        let _mute = spawn(&bus, ScriptedAgent::new(AgentProfile::new("mute", "Mute")));

        let start = Instant::now();
        let replies = messenger
            .broadcast_and_collect(
                &ids(&["fast", "slow", "mute"]),
                MessageKind::Propose,
                json!({ "action": "propose" }),
                Duration::from_secs(5),
            )
            .await;

        assert_eq!(replies.len(), 1);
        assert_eq!(replies[&AgentId::new("fast")].payload, json!("A"));
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_replies_do_not_pile_up_in_mailbox() {
        let bus = Arc::new(MessageBus::new(100));
        let messenger = Messenger::new(Arc::clone(&bus));
        let _slow = spawn(
            &bus,
            ScriptedAgent::new(AgentProfile::new("slow", "Slow"))
                .on(MessageKind::Request, json!({ "result": "late" }))
                .delay_on(MessageKind::Request, Duration::from_secs(2)),
        );

        for _ in 0..5 {
            let reply = messenger
                .request_and_wait(
                    &AgentId::new("slow"),
                    messenger.message(MessageKind::Request, json!({ "action": "solve" })),
                    Duration::from_secs(1),
                )
                .await;
            assert!(reply.is_none());
        }
        tokio::time::sleep(Duration::from_secs(15)).await;

        assert_eq!(bus.queue_len(&AgentId::system()), 0);
        assert_eq!(bus.discarded_count(&AgentId::system()), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_broadcast_replies_are_dropped() {
        let bus = Arc::new(MessageBus::new(100));
        let messenger = Messenger::new(Arc::clone(&bus));
        let _slow = spawn(
            &bus,
            ScriptedAgent::new(AgentProfile::new("slow", "Slow"))
                .on(MessageKind::Vote, json!("accept"))
                .delay_on(MessageKind::Vote, Duration::from_secs(10)),
        );

        let replies = messenger
            .broadcast_and_collect(&ids(&["slow"]), MessageKind::Vote, json!({}), Duration::from_secs(1))
            .await;
        assert!(replies.is_empty());
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(bus.queue_len(&AgentId::system()), 0);
    }

    #[tokio::test]
    async fn test_broadcast_collect_returns_early_when_all_replied() {
        let bus = Arc::new(MessageBus::new(100));
        let messenger = Messenger::new(Arc::clone(&bus));
        let _a = spawn(&bus, ScriptedAgent::new(AgentProfile::new("a", "A")).on(MessageKind::Vote, json!("accept")));
        let _b = spawn(&bus, ScriptedAgent::new(AgentProfile::new("b", "B")).on(MessageKind::Vote, json!("reject")));

        let replies = tokio::time::timeout(
            Duration::from_secs(5),
            messenger.broadcast_and_collect(&ids(&["a", "b"]), MessageKind::Vote, json!({}), Duration::from_secs(300)),
        )
        .await
        .unwrap();
        assert_eq!(replies.len(), 2);
    }

    #[tokio::test]
    async fn test_inform_counts_deliveries() {
        let bus = Arc::new(MessageBus::new(100));
        let messenger = Messenger::new(Arc::clone(&bus));
        bus.register(AgentId::new("a"));

        let sent = messenger.inform(&ids(&["a", "ghost"]), MessageKind::Inform, json!({ "round": 1 }));
        assert_eq!(sent, 1);
        let inbox = bus.receive(&AgentId::new("a"), 10);
        assert_eq!(inbox.len(), 1);
        assert!(!inbox[0].response_required);
    }
}
