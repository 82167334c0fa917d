//! Swarm protocol
//!
//! Every agent solves the task on its own. When every solution is an object
//! they are merged key by key; otherwise the solutions are put to a vote
//! weighted by each agent's track record.

use super::messenger::reply_result;
use super::{ProtocolContext, ProtocolError, ProtocolHandler, agent_ids};
use async_trait::async_trait;
use concord_domain::{
    AgentId, AgentProfile, MessageKind, Outcome, ProtocolKind, SessionId, Task, find_compromise,
    weighted_voting,
};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use tracing::info;

/// Vote weight of an agent with no performance history.
pub const DEFAULT_SWARM_WEIGHT: f64 = 0.5;

pub struct SwarmProtocol;

#[async_trait]
impl ProtocolHandler for SwarmProtocol {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Swarm
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

        let solutions: BTreeMap<AgentId, Value> = ctx
            .messenger
            .broadcast_and_collect(
                &agent_ids(agents),
                MessageKind::Request,
                json!({
                    "action": "solve",
                    "collaboration_id": collaboration_id,
                    "task": task,
                }),
                ctx.params.request_timeout,
            )
            .await
            .iter()
            .map(|(agent, reply)| (agent.clone(), reply_result(reply)))
            .filter(|(_, solution)| !solution.is_null())
            .collect();

        if solutions.is_empty() {
            return Ok(Outcome::failed(
                collaboration_id.clone(),
                ProtocolKind::Swarm,
                "no agent produced a solution",
            ));
        }

        let agent_results = solutions.iter().map(|(a, s)| (a.to_string(), s.clone())).collect();

        if solutions.values().all(Value::is_object) {
            info!(collaboration = %collaboration_id, solutions = solutions.len(), "Merging swarm solutions");
            return Ok(
                Outcome::completed(collaboration_id.clone(), ProtocolKind::Swarm, find_compromise(&solutions))
                    .with_agent_results(agent_results),
            );
        }

        let weights: HashMap<AgentId, f64> = agents
            .iter()
            .filter(|a| !a.performance_history.is_empty())
            .map(|a| (a.id.clone(), a.average_performance()))
            .collect();
        let Some(vote) = weighted_voting(&solutions, &weights, DEFAULT_SWARM_WEIGHT) else {
            return Ok(Outcome::failed(collaboration_id.clone(), ProtocolKind::Swarm, "weighted vote had no winner"));
        };
        info!(
            collaboration = %collaboration_id,
            weight = vote.weight,
            total_weight = vote.total_weight,
            "Swarm vote decided"
        );

        Ok(Outcome::completed(collaboration_id.clone(), ProtocolKind::Swarm, vote.winner).with_agent_results(agent_results))
    }
}
