//! Test fixtures: a bus with scripted agents running on it.

use crate::agents::ScriptedAgent;
use crate::bus::MessageBus;
use crate::config::CollaborationParams;
use crate::ports::agent::Agent;
use crate::protocols::{Messenger, ProtocolContext};
use crate::runtime::{AgentHandle, AgentRuntime};
use concord_domain::{AgentProfile, Capability, SessionId};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub(crate) struct Harness {
    pub bus: Arc<MessageBus>,
    pub ctx: ProtocolContext,
    pub profiles: Vec<AgentProfile>,
    pub session: SessionId,
    _handles: Vec<AgentHandle>,
}

/// Spawn `agents` on a fresh bus. Every wait defaults to five seconds.
pub(crate) fn harness(agents: Vec<ScriptedAgent>) -> Harness {
    harness_with(agents, CollaborationParams::default().with_uniform_timeout(Duration::from_secs(5)))
}

pub(crate) fn harness_with(agents: Vec<ScriptedAgent>, params: CollaborationParams) -> Harness {
    let bus = Arc::new(MessageBus::new(params.queue_capacity));
    let messenger = Messenger::new(Arc::clone(&bus));
    let mut profiles = Vec::new();
    let mut handles = Vec::new();
    for agent in agents {
        let profile = agent.profile();
        bus.register(profile.id.clone());
        handles.push(AgentRuntime::spawn(
            Arc::new(agent),
            Arc::clone(&bus),
            CancellationToken::new(),
        ));
        profiles.push(profile);
    }
    profiles.sort_by(|a, b| a.id.cmp(&b.id));

    Harness {
        bus,
        ctx: ProtocolContext::new(messenger, params),
        profiles,
        session: SessionId::new("session-under-test"),
        _handles: handles,
    }
}

pub(crate) fn scripted(id: &str, capabilities: &[Capability]) -> ScriptedAgent {
    ScriptedAgent::new(AgentProfile::new(id, id).with_capabilities(capabilities.iter().copied()))
}
