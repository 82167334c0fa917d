//! Agent runtime
//!
//! Drives one [`Agent`] on its own tokio task: take the next inbox message,
//! hand it to the agent, route the reply. Messages are processed one at a
//! time in arrival order.

use crate::bus::MessageBus;
use crate::ports::agent::Agent;
use chrono::Utc;
use concord_domain::AgentId;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Handle to a running agent loop.
pub struct AgentHandle {
    agent_id: AgentId,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl AgentHandle {
    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    /// Ask the loop to stop without waiting for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stop the loop and wait until it has exited.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            warn!(agent = %self.agent_id, "Agent task ended abnormally: {}", e);
        }
    }
}

pub struct AgentRuntime;

impl AgentRuntime {
    /// Spawn the message loop for `agent`.
    ///
    /// The agent's inbox must already be registered on `bus`. The loop ends
    /// when `cancel` fires or the inbox is unregistered.
    pub fn spawn(agent: Arc<dyn Agent>, bus: Arc<MessageBus>, cancel: CancellationToken) -> AgentHandle {
        let agent_id = agent.profile().id;
        let join = tokio::spawn(Self::run(agent, bus, agent_id.clone(), cancel.clone()));
        AgentHandle {
            agent_id,
            cancel,
            join,
        }
    }

    async fn run(agent: Arc<dyn Agent>, bus: Arc<MessageBus>, agent_id: AgentId, cancel: CancellationToken) {
        debug!(agent = %agent_id, "Agent loop started");

        loop {
            let message = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                message = bus.next_message(&agent_id) => match message {
                    Some(message) => message,
                    None => break,
                },
            };

            if message.is_expired_at(Utc::now()) {
                debug!(
                    agent = %agent_id,
                    kind = %message.kind,
                    conversation = %message.conversation_id,
                    "Skipping expired message"
                );
                continue;
            }

            let reply = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                reply = agent.handle(&message) => reply,
            };

            let Some(reply) = reply else {
                continue;
            };
            if !message.response_required {
                debug!(agent = %agent_id, kind = %message.kind, "Discarding reply to one-way message");
                continue;
            }

            let response = message.reply(agent_id.clone(), reply.kind, reply.payload);
            if let Err(e) = bus.send(response) {
                warn!(agent = %agent_id, "Reply not delivered: {}", e);
            }
        }

        info!(agent = %agent_id, "Agent loop stopped");
    }
}
