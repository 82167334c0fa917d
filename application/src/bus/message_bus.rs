//! In-process message bus.
//!
//! One bounded FIFO inbox per registered agent plus a weighted, directed
//! communication graph (`sender → recipient → count`). Inboxes and the
//! graph sit behind a single mutex; waiters park on a per-inbox
//! [`Notify`] instead of polling.
//!
//! Delivery is at-most-once: a full inbox silently drops its oldest message.
//! A waiter that gives up on a conversation abandons it, and late messages
//! in that conversation are dropped instead of queued.

use crate::sync::lock;
use concord_domain::{AgentId, ConversationId, Message};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::{Instant, timeout_at};
use tracing::debug;

/// Errors raised by [`MessageBus::send`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("Unknown recipient: {0}")]
    UnknownRecipient(AgentId),
}

struct Inbox {
    queue: VecDeque<Message>,
    dropped: u64,
    notify: Arc<Notify>,
    /// Conversations nobody waits for any more, oldest first.
    abandoned: VecDeque<ConversationId>,
    abandoned_set: HashSet<ConversationId>,
    discarded: u64,
}

impl Inbox {
    fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            dropped: 0,
            notify: Arc::new(Notify::new()),
            abandoned: VecDeque::new(),
            abandoned_set: HashSet::new(),
            discarded: 0,
        }
    }

    /// Whether `message` belongs to an abandoned conversation. Counts it as
    /// discarded if so.
    fn discards(&mut self, message: &Message) -> bool {
        let discard = self.abandoned_set.contains(&message.conversation_id);
        if discard {
            self.discarded += 1;
        }
        discard
    }

    /// Remember `conversation` as abandoned, forgetting the oldest beyond
    /// `capacity`. Returns how many queued messages it removed.
    fn abandon(&mut self, conversation: &ConversationId, capacity: usize) -> usize {
        if self.abandoned_set.insert(conversation.clone()) {
            self.abandoned.push_back(conversation.clone());
            while self.abandoned.len() > capacity {
                if let Some(oldest) = self.abandoned.pop_front() {
                    self.abandoned_set.remove(&oldest);
                }
            }
        }
        let before = self.queue.len();
        self.queue.retain(|m| m.conversation_id != *conversation);
        let removed = before - self.queue.len();
        self.discarded += removed as u64;
        removed
    }

    /// Enqueue, evicting from the front while full. Returns the number of
    /// evicted messages.
    fn push(&mut self, message: Message, capacity: usize) -> usize {
        let mut evicted = 0;
        while self.queue.len() >= capacity {
            self.queue.pop_front();
            evicted += 1;
        }
        self.dropped += evicted as u64;
        self.queue.push_back(message);
        self.notify.notify_waiters();
        evicted
    }
}

#[derive(Default)]
struct BusState {
    inboxes: HashMap<AgentId, Inbox>,
    edges: HashMap<AgentId, HashMap<AgentId, u64>>,
}

/// Shared message bus. Cheap to share behind an `Arc`.
pub struct MessageBus {
    state: Mutex<BusState>,
    capacity: usize,
}

impl MessageBus {
    /// A bus whose inboxes hold at most `capacity` messages (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(BusState::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // ==================== Registration ====================

    /// Create an inbox for `agent`. Returns false if it already had one.
    pub fn register(&self, agent: AgentId) -> bool {
        let mut state = lock(&self.state);
        if state.inboxes.contains_key(&agent) {
            return false;
        }
        debug!(agent = %agent, "Registered inbox");
        state.inboxes.insert(agent, Inbox::new());
        true
    }

    /// Drop `agent`'s inbox and remove it from the communication graph,
    /// outgoing and incoming edges alike. Pending waiters wake up empty.
    pub fn unregister(&self, agent: &AgentId) -> bool {
        let mut state = lock(&self.state);
        let Some(inbox) = state.inboxes.remove(agent) else {
            return false;
        };
        inbox.notify.notify_waiters();
        state.edges.remove(agent);
        for targets in state.edges.values_mut() {
            targets.remove(agent);
        }
        debug!(agent = %agent, pending = inbox.queue.len(), "Unregistered inbox");
        true
    }

    pub fn is_registered(&self, agent: &AgentId) -> bool {
        lock(&self.state).inboxes.contains_key(agent)
    }

    /// Registered agents, ordered by id.
    pub fn registered_agents(&self) -> Vec<AgentId> {
        let mut agents: Vec<_> = lock(&self.state).inboxes.keys().cloned().collect();
        agents.sort();
        agents
    }

    // ==================== Sending ====================

    /// Deliver `message`, returning the number of inboxes it reached.
    ///
    /// Addressed messages go to their recipient and bump the graph edge
    /// `sender → recipient` (unless the sender is the system mailbox).
    /// Broadcasts go to every registered agent except the sender and leave
    /// the graph untouched.
    pub fn send(&self, message: Message) -> Result<usize, BusError> {
        let mut guard = lock(&self.state);
        let state = &mut *guard;
        let sender = message.sender.clone();

        match message.recipient.clone() {
            Some(recipient) => {
                let Some(inbox) = state.inboxes.get_mut(&recipient) else {
                    return Err(BusError::UnknownRecipient(recipient));
                };
                if inbox.discards(&message) {
                    debug!(
                        from = %sender,
                        to = %recipient,
                        conversation = %message.conversation_id,
                        "Dropped message for abandoned conversation"
                    );
                    return Ok(0);
                }
                debug!(
                    from = %sender,
                    to = %recipient,
                    kind = %message.kind,
                    conversation = %message.conversation_id,
                    "Message queued"
                );
                let evicted = inbox.push(message, self.capacity);
                if evicted > 0 {
                    debug!(agent = %recipient, evicted, "Inbox full, dropped oldest message");
                }
                if !sender.is_system() {
                    *state
                        .edges
                        .entry(sender)
                        .or_default()
                        .entry(recipient)
                        .or_insert(0) += 1;
                }
                Ok(1)
            }
            None => {
                let mut delivered = 0;
                for (agent, inbox) in state.inboxes.iter_mut() {
                    if *agent == sender || inbox.discards(&message) {
                        continue;
                    }
                    let evicted = inbox.push(message.clone(), self.capacity);
                    if evicted > 0 {
                        debug!(agent = %agent, evicted, "Inbox full, dropped oldest message");
                    }
                    delivered += 1;
                }
                debug!(from = %sender, kind = %message.kind, delivered, "Broadcast queued");
                Ok(delivered)
            }
        }
    }

    // ==================== Receiving ====================

    /// Take up to `max` of the oldest messages from `agent`'s inbox without
    /// waiting. Unknown agents get nothing.
    pub fn receive(&self, agent: &AgentId, max: usize) -> Vec<Message> {
        let mut state = lock(&self.state);
        match state.inboxes.get_mut(agent) {
            Some(inbox) => {
                let count = max.min(inbox.queue.len());
                inbox.queue.drain(..count).collect()
            }
            None => Vec::new(),
        }
    }

    /// Wait until a message matching `predicate` is in `agent`'s inbox, then
    /// remove and return it. Other messages stay queued in order.
    ///
    /// Returns `None` once `deadline` passes or if the inbox is unregistered.
    pub async fn wait_for<F>(&self, agent: &AgentId, mut predicate: F, deadline: Instant) -> Option<Message>
    where
        F: FnMut(&Message) -> bool,
    {
        loop {
            let notify = self.notifier(agent)?;
            let notified = notify.notified();
            tokio::pin!(notified);
            // Register interest before looking, so a send in between is not missed.
            notified.as_mut().enable();

            {
                let mut state = lock(&self.state);
                let inbox = state.inboxes.get_mut(agent)?;
                if let Some(index) = inbox.queue.iter().position(|m| predicate(m)) {
                    return inbox.queue.remove(index);
                }
            }

            if timeout_at(deadline, notified).await.is_err() {
                return None;
            }
        }
    }

    /// Wait for the next message in `agent`'s inbox, however long it takes.
    ///
    /// Returns `None` if the inbox is unregistered.
    pub async fn next_message(&self, agent: &AgentId) -> Option<Message> {
        loop {
            let notify = self.notifier(agent)?;
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = lock(&self.state);
                let inbox = state.inboxes.get_mut(agent)?;
                if let Some(message) = inbox.queue.pop_front() {
                    return Some(message);
                }
            }

            notified.await;
        }
    }

    /// Stop accepting messages of `conversation` into `agent`'s inbox and
    /// remove any already queued. Returns how many were removed.
    ///
    /// Only the most recent `capacity` abandoned conversations are
    /// remembered per inbox.
    pub fn abandon_conversation(&self, agent: &AgentId, conversation: &ConversationId) -> usize {
        let mut state = lock(&self.state);
        let Some(inbox) = state.inboxes.get_mut(agent) else {
            return 0;
        };
        let removed = inbox.abandon(conversation, self.capacity);
        debug!(agent = %agent, conversation = %conversation, removed, "Conversation abandoned");
        removed
    }

    fn notifier(&self, agent: &AgentId) -> Option<Arc<Notify>> {
        lock(&self.state)
            .inboxes
            .get(agent)
            .map(|inbox| Arc::clone(&inbox.notify))
    }

    // ==================== Queries ====================

    /// Messages sent `from → to` so far.
    pub fn edge_weight(&self, from: &AgentId, to: &AgentId) -> u64 {
        lock(&self.state)
            .edges
            .get(from)
            .and_then(|targets| targets.get(to))
            .copied()
            .unwrap_or(0)
    }

    /// Total weight of every edge touching `agent`, in either direction.
    pub fn interaction_count(&self, agent: &AgentId) -> u64 {
        let state = lock(&self.state);
        let outgoing: u64 = state
            .edges
            .get(agent)
            .map(|targets| targets.values().sum())
            .unwrap_or(0);
        let incoming: u64 = state
            .edges
            .iter()
            .filter(|(from, _)| *from != agent)
            .filter_map(|(_, targets)| targets.get(agent))
            .sum();
        outgoing + incoming
    }

    pub fn queue_len(&self, agent: &AgentId) -> usize {
        lock(&self.state)
            .inboxes
            .get(agent)
            .map_or(0, |inbox| inbox.queue.len())
    }

    /// Messages evicted from `agent`'s inbox by overflow.
    pub fn dropped_count(&self, agent: &AgentId) -> u64 {
        lock(&self.state)
            .inboxes
            .get(agent)
            .map_or(0, |inbox| inbox.dropped)
    }

    /// Messages dropped from `agent`'s inbox because their conversation was
    /// abandoned.
    pub fn discarded_count(&self, agent: &AgentId) -> u64 {
        lock(&self.state)
            .inboxes
            .get(agent)
            .map_or(0, |inbox| inbox.discarded)
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(crate::config::collaboration_params::DEFAULT_QUEUE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_domain::MessageKind;
    use serde_json::json;
    use std::time::Duration;

    fn id(s: &str) -> AgentId {
        AgentId::new(s)
    }

    fn bus_with(agents: &[&str]) -> MessageBus {
        let bus = MessageBus::new(1000);
        for agent in agents {
            bus.register(id(agent));
        }
        bus
    }

    fn note(from: &str, to: &str, n: u64) -> Message {
        Message::new(id(from), MessageKind::Inform, json!({ "n": n })).to(id(to))
    }

    #[test]
    fn test_receive_is_fifo_bounded_and_never_redelivers() {
        let bus = bus_with(&["a", "b"]);
        for n in 0..5 {
            bus.send(note("a", "b", n)).unwrap();
        }

        let first = bus.receive(&id("b"), 2);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].payload["n"], 0);
        assert_eq!(first[1].payload["n"], 1);

        let rest = bus.receive(&id("b"), 10);
        assert_eq!(rest.len(), 3);
        assert_eq!(rest[0].payload["n"], 2);

        assert!(bus.receive(&id("b"), 10).is_empty());
        assert!(bus.receive(&id("nobody"), 10).is_empty());
    }

    #[test]
    fn test_unknown_recipient() {
        let bus = bus_with(&["a"]);
        let err = bus.send(note("a", "ghost", 0)).unwrap_err();
        assert_eq!(err, BusError::UnknownRecipient(id("ghost")));
        assert_eq!(bus.edge_weight(&id("a"), &id("ghost")), 0);
    }

    #[test]
    fn test_broadcast_skips_sender_and_graph() {
        let bus = bus_with(&["a", "b", "c"]);
        let delivered = bus
            .send(Message::new(id("a"), MessageKind::Inform, json!("hello")))
            .unwrap();

        assert_eq!(delivered, 2);
        assert_eq!(bus.queue_len(&id("a")), 0);
        assert_eq!(bus.queue_len(&id("b")), 1);
        assert_eq!(bus.queue_len(&id("c")), 1);
        assert_eq!(bus.interaction_count(&id("a")), 0);
    }

    #[test]
    fn test_edge_weights_and_unregister() {
        let bus = bus_with(&["a", "b", "system"]);
        bus.send(note("a", "b", 0)).unwrap();
        bus.send(note("a", "b", 1)).unwrap();
        bus.send(note("b", "a", 2)).unwrap();
        bus.send(note("system", "a", 3)).unwrap();

        assert_eq!(bus.edge_weight(&id("a"), &id("b")), 2);
        assert_eq!(bus.edge_weight(&id("b"), &id("a")), 1);
        assert_eq!(bus.edge_weight(&id("system"), &id("a")), 0);
        assert_eq!(bus.interaction_count(&id("a")), 3);

        assert!(bus.unregister(&id("b")));
        assert!(!bus.unregister(&id("b")));
        assert_eq!(bus.edge_weight(&id("a"), &id("b")), 0);
        assert_eq!(bus.edge_weight(&id("b"), &id("a")), 0);
        assert_eq!(bus.interaction_count(&id("a")), 0);
        assert!(!bus.is_registered(&id("b")));
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let bus = MessageBus::new(3);
        bus.register(id("a"));
        bus.register(id("b"));
        for n in 0..5 {
            bus.send(note("a", "b", n)).unwrap();
        }

        assert_eq!(bus.queue_len(&id("b")), 3);
        assert_eq!(bus.dropped_count(&id("b")), 2);
        let kept: Vec<_> = bus
            .receive(&id("b"), 10)
            .iter()
            .map(|m| m.payload["n"].as_u64().unwrap())
            .collect();
        assert_eq!(kept, vec![2, 3, 4]);
    }

    #[test]
    fn test_abandoned_conversation_is_dropped() {
        let bus = bus_with(&["a", "b", "c"]);
        let stale = ConversationId::new("stale");
        bus.send(note("a", "b", 0).in_conversation(stale.clone())).unwrap();
        bus.send(note("a", "b", 1)).unwrap();

        assert_eq!(bus.abandon_conversation(&id("b"), &stale), 1);
        assert_eq!(bus.queue_len(&id("b")), 1);

        // Late replies, addressed or broadcast, never reach the inbox again.
        assert_eq!(bus.send(note("a", "b", 2).in_conversation(stale.clone())).unwrap(), 0);
        let late = Message::new(id("a"), MessageKind::Inform, json!({ "n": 3 }))
            .in_conversation(stale.clone());
        assert_eq!(bus.send(late).unwrap(), 1);
        assert_eq!(bus.queue_len(&id("b")), 1);
        assert_eq!(bus.queue_len(&id("c")), 1);
        assert_eq!(bus.discarded_count(&id("b")), 3);

        // Other conversations and other inboxes are unaffected.
        bus.send(note("c", "b", 4)).unwrap();
        assert_eq!(bus.queue_len(&id("b")), 2);
        assert_eq!(bus.abandon_conversation(&id("nobody"), &stale), 0);
    }

    #[test]
    fn test_abandoned_conversations_are_bounded() {
        let bus = MessageBus::new(2);
        bus.register(id("a"));
        bus.register(id("b"));
        for n in 0..3 {
            bus.abandon_conversation(&id("b"), &ConversationId::new(format!("c{n}")));
        }

        // The oldest abandoned conversation is forgotten.
        let revived = note("a", "b", 0).in_conversation(ConversationId::new("c0"));
        assert_eq!(bus.send(revived).unwrap(), 1);
        let still_dropped = note("a", "b", 1).in_conversation(ConversationId::new("c2"));
        assert_eq!(bus.send(still_dropped).unwrap(), 0);
    }

    #[test]
    fn test_register_twice_keeps_inbox() {
        let bus = bus_with(&["a", "b"]);
        bus.send(note("a", "b", 0)).unwrap();
        assert!(!bus.register(id("b")));
        assert_eq!(bus.queue_len(&id("b")), 1);
        assert_eq!(bus.registered_agents(), vec![id("a"), id("b")]);
    }

    #[tokio::test]
    async fn test_wait_for_takes_only_the_match() {
        let bus = bus_with(&["a", "b"]);
        bus.send(note("a", "b", 1)).unwrap();
        bus.send(note("a", "b", 2)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(1);
        let found = bus
            .wait_for(&id("b"), |m| m.payload["n"] == 2, deadline)
            .await
            .unwrap();
        assert_eq!(found.payload["n"], 2);
        assert_eq!(bus.queue_len(&id("b")), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_times_out() {
        let bus = bus_with(&["a", "b"]);
        bus.send(note("a", "b", 1)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let found = bus.wait_for(&id("b"), |m| m.payload["n"] == 99, deadline).await;
        assert!(found.is_none());
        assert!(Instant::now() >= deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_wakes_on_late_send() {
        let bus = Arc::new(bus_with(&["a", "b"]));
        let sender = Arc::clone(&bus);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            sender.send(note("a", "b", 7)).unwrap();
        });

        let deadline = Instant::now() + Duration::from_secs(10);
        let found = bus.wait_for(&id("b"), |m| m.payload["n"] == 7, deadline).await;
        assert!(found.is_some());
        assert!(Instant::now() < deadline);
    }

    #[tokio::test]
    async fn test_next_message_returns_none_after_unregister() {
        let bus = Arc::new(bus_with(&["a", "b"]));
        bus.send(note("a", "b", 1)).unwrap();
        assert_eq!(bus.next_message(&id("b")).await.unwrap().payload["n"], 1);

        let waiter = Arc::clone(&bus);
        let handle = tokio::spawn(async move { waiter.next_message(&id("b")).await });
        tokio::task::yield_now().await;
        bus.unregister(&id("b"));
        assert!(handle.await.unwrap().is_none());
    }
}
