//! Blackboard protocol
//!
//! Agents take turns around a session-local [`SharedWorkspace`]. Each round
//! the current board is broadcast; every reply is an object of key → value
//! written to the board under a per-key lock. The run stops after the
//! configured number of rounds, or earlier once a round changes nothing.

use super::messenger::reply_result;
use super::{ProtocolContext, ProtocolError, ProtocolHandler, agent_ids};
use crate::shared_workspace::SharedWorkspace;
use async_trait::async_trait;
use concord_domain::{AgentId, AgentProfile, MessageKind, Outcome, ProtocolKind, SessionId, Task};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

pub struct BlackboardProtocol;

#[async_trait]
impl ProtocolHandler for BlackboardProtocol {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Blackboard
    }

    async fn execute(
        &self,
        ctx: &ProtocolContext,
        collaboration_id: &SessionId,
        task: &Task,
        agents: &[AgentProfile],
    ) -> Result<Outcome, ProtocolError> {
        if agents.is_empty() {
            return Err(ProtocolError::NoParticipants);
        }

        let participants = agent_ids(agents);
        let board = SharedWorkspace::new(format!("blackboard-{collaboration_id}"), participants.clone());
        let mut contributed: BTreeMap<AgentId, BTreeSet<String>> = BTreeMap::new();

        for round in 1..=ctx.params.blackboard_rounds {
            let replies = ctx
                .messenger
                .broadcast_and_collect(
                    &participants,
                    MessageKind::Request,
                    json!({
                        "action": "contribute",
                        "collaboration_id": collaboration_id,
                        "task": task,
                        "round": round,
                        "blackboard": board.snapshot().data,
                    }),
                    ctx.params.request_timeout,
                )
                .await;

            let mut changes = 0;
            for (agent, reply) in &replies {
                let Some(entries) = contributions(&reply_result(reply)) else {
                    debug!(agent = %agent, round, "Contribution is not an object");
                    continue;
                };
                for (key, value) in entries {
                    if write_entry(&board, &key, value, agent) {
                        contributed.entry(agent.clone()).or_default().insert(key);
                        changes += 1;
                    }
                }
            }

            info!(collaboration = %collaboration_id, round, changes, "Blackboard round finished");
            if changes == 0 {
                break;
            }
        }

        let snapshot = board.snapshot();
        if snapshot.data.is_empty() {
            return Ok(Outcome::failed(
                collaboration_id.clone(),
                ProtocolKind::Blackboard,
                "no agent contributed to the blackboard",
            ));
        }

        let agent_results = contributed
            .into_iter()
            .map(|(agent, keys)| (agent.to_string(), json!(keys)))
            .collect();
        let result = Value::Object(snapshot.data.into_iter().collect());
        Ok(Outcome::completed(collaboration_id.clone(), ProtocolKind::Blackboard, result).with_agent_results(agent_results))
    }
}

/// A contribution is a `contributions` object, or the reply itself when it
/// is an object.
fn contributions(reply: &Value) -> Option<Map<String, Value>> {
    reply
        .get("contributions")
        .and_then(Value::as_object)
        .or_else(|| reply.as_object())
        .cloned()
}

/// Write one entry under its lock. Returns whether the board changed.
fn write_entry(board: &SharedWorkspace, key: &str, value: Value, agent: &AgentId) -> bool {
    if board.get(key).as_ref() == Some(&value) {
        return false;
    }
    if !board.acquire_lock(key, agent) {
        debug!(key, agent = %agent, "Blackboard entry locked by another agent");
        return false;
    }
    let written = board.put_locked(key, value, agent).is_ok();
    board.release_lock(key, agent);
    written
}
