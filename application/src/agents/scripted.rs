//! Deterministic stub agent.
//!
//! [`ScriptedAgent`] answers from a fixed script, keyed by payload `action`
//! or by [`MessageKind`]: a reply (or a sequence of replies, the last one
//! repeating), silence, and an optional delay before answering. Everything
//! it receives is recorded for later assertions.

use crate::ports::agent::{Agent, AgentReply};
use crate::sync::lock;
use async_trait::async_trait;
use concord_domain::{AgentProfile, Message, MessageKind};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Trigger {
    Action(String),
    Kind(MessageKind),
}

#[derive(Debug, Clone)]
enum Script {
    Replies(Vec<Value>),
    Silent,
}

/// Shared log of the messages an agent handled.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    messages: Arc<Mutex<Vec<Message>>>,
}

impl Recorder {
    pub fn count(&self) -> usize {
        lock(&self.messages).len()
    }

    pub fn messages(&self) -> Vec<Message> {
        lock(&self.messages).clone()
    }

    /// `action` field of every handled message, in order.
    pub fn actions(&self) -> Vec<String> {
        lock(&self.messages)
            .iter()
            .filter_map(|m| m.action().map(str::to_string))
            .collect()
    }

    fn record(&self, message: &Message) {
        lock(&self.messages).push(message.clone());
    }
}

pub struct ScriptedAgent {
    profile: AgentProfile,
    scripts: HashMap<Trigger, Script>,
    delays: HashMap<Trigger, Duration>,
    cursors: Mutex<HashMap<Trigger, usize>>,
    recorder: Recorder,
}

impl ScriptedAgent {
    /// An agent that stays silent until scripted.
    pub fn new(profile: AgentProfile) -> Self {
        Self {
            profile,
            scripts: HashMap::new(),
            delays: HashMap::new(),
            cursors: Mutex::new(HashMap::new()),
            recorder: Recorder::default(),
        }
    }

    // ==================== Builder Methods ====================

    /// Answer every message of `kind` with `payload`.
    pub fn on(self, kind: MessageKind, payload: Value) -> Self {
        self.on_sequence(kind, vec![payload])
    }

    /// Answer successive messages of `kind` with successive payloads; the
    /// last one repeats.
    pub fn on_sequence(mut self, kind: MessageKind, payloads: Vec<Value>) -> Self {
        self.scripts.insert(Trigger::Kind(kind), Script::Replies(payloads));
        self
    }

    /// Answer every message whose payload `action` is `action`.
    pub fn on_action(self, action: impl Into<String>, payload: Value) -> Self {
        self.on_action_sequence(action, vec![payload])
    }

    pub fn on_action_sequence(mut self, action: impl Into<String>, payloads: Vec<Value>) -> Self {
        self.scripts
            .insert(Trigger::Action(action.into()), Script::Replies(payloads));
        self
    }

    pub fn silent_on(mut self, kind: MessageKind) -> Self {
        self.scripts.insert(Trigger::Kind(kind), Script::Silent);
        self
    }

    pub fn silent_on_action(mut self, action: impl Into<String>) -> Self {
        self.scripts.insert(Trigger::Action(action.into()), Script::Silent);
        self
    }

    /// Wait `delay` before answering messages of `kind`.
    pub fn delay_on(mut self, kind: MessageKind, delay: Duration) -> Self {
        self.delays.insert(Trigger::Kind(kind), delay);
        self
    }

    pub fn delay_on_action(mut self, action: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(Trigger::Action(action.into()), delay);
        self
    }

    pub fn recorder(&self) -> Recorder {
        self.recorder.clone()
    }

    /// Action triggers win over kind triggers.
    fn triggers(message: &Message) -> Vec<Trigger> {
        let mut triggers = Vec::with_capacity(2);
        if let Some(action) = message.action() {
            triggers.push(Trigger::Action(action.to_string()));
        }
        triggers.push(Trigger::Kind(message.kind));
        triggers
    }

    fn next_payload(&self, trigger: &Trigger, payloads: &[Value]) -> Option<Value> {
        let mut cursors = lock(&self.cursors);
        let cursor = cursors.entry(trigger.clone()).or_insert(0);
        let payload = payloads.get((*cursor).min(payloads.len().saturating_sub(1))).cloned();
        *cursor += 1;
        payload
    }
}

/// Reply kind conventionally paired with a request kind.
fn reply_kind(kind: MessageKind) -> MessageKind {
    match kind {
        MessageKind::TaskAssignment | MessageKind::Award => MessageKind::TaskResult,
        MessageKind::CallForProposals => MessageKind::Bid,
        MessageKind::Propose => MessageKind::Propose,
        MessageKind::Vote => MessageKind::Vote,
        _ => MessageKind::Response,
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn profile(&self) -> AgentProfile {
        self.profile.clone()
    }

    async fn handle(&self, message: &Message) -> Option<AgentReply> {
        self.recorder.record(message);
        let triggers = Self::triggers(message);

        if let Some(delay) = triggers.iter().find_map(|t| self.delays.get(t)) {
            tokio::time::sleep(*delay).await;
        }

        let (trigger, script) = triggers
            .iter()
            .find_map(|t| self.scripts.get(t).map(|s| (t, s)))?;
        match script {
            Script::Silent => None,
            Script::Replies(payloads) => {
                let payload = self.next_payload(trigger, payloads)?;
                Some(AgentReply::new(reply_kind(message.kind), payload))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_domain::AgentId;
    use serde_json::json;

    fn message(kind: MessageKind, action: &str) -> Message {
        Message::new(AgentId::system(), kind, json!({ "action": action })).to(AgentId::new("s"))
    }

    #[tokio::test]
    async fn test_action_overrides_kind() {
        let agent = ScriptedAgent::new(AgentProfile::new("s", "S"))
            .on(MessageKind::Request, json!("generic"))
            .on_action("plan", json!("plan"));

        let reply = agent.handle(&message(MessageKind::Request, "plan")).await.unwrap();
        assert_eq!(reply.payload, json!("plan"));
        let reply = agent.handle(&message(MessageKind::Request, "solve")).await.unwrap();
        assert_eq!(reply.payload, json!("generic"));
        assert_eq!(reply.kind, MessageKind::Response);
    }

    #[tokio::test]
    async fn test_sequence_repeats_last() {
        let agent = ScriptedAgent::new(AgentProfile::new("s", "S"))
            .on_sequence(MessageKind::Propose, vec![json!("A"), json!("B")]);

        let mut seen = Vec::new();
        for _ in 0..3 {
            let reply = agent.handle(&message(MessageKind::Propose, "propose")).await.unwrap();
            assert_eq!(reply.kind, MessageKind::Propose);
            seen.push(reply.payload);
        }
        assert_eq!(seen, vec![json!("A"), json!("B"), json!("B")]);
    }

    #[tokio::test]
    async fn test_silence_and_recording() {
        let agent = ScriptedAgent::new(AgentProfile::new("s", "S"))
            .on(MessageKind::Request, json!(1))
            .silent_on_action("plan");
        let recorder = agent.recorder();

        assert!(agent.handle(&message(MessageKind::Request, "plan")).await.is_none());
        assert!(agent.handle(&message(MessageKind::Inform, "status")).await.is_none());
        assert_eq!(recorder.actions(), vec!["plan".to_string(), "status".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay() {
        let agent = ScriptedAgent::new(AgentProfile::new("s", "S"))
            .on(MessageKind::Vote, json!({ "vote": "accept" }))
            .delay_on(MessageKind::Vote, Duration::from_secs(30));

        let start = tokio::time::Instant::now();
        agent.handle(&message(MessageKind::Vote, "vote")).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(30));
    }
}
