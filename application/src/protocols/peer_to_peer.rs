//! Peer-to-peer protocol
//!
//! Every peer solves the task, then reviews the other peers' solutions and
//! answers with a refined one. Refined solutions are merged into one result.

use super::messenger::reply_result;
use super::{ProtocolContext, ProtocolError, ProtocolHandler, agent_ids};
use async_trait::async_trait;
use concord_domain::{
    AgentId, AgentProfile, MessageKind, Outcome, ProtocolKind, SessionId, Task, find_compromise,
    pairwise_agreement_matrix,
};
use futures::future::join_all;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::{info, warn};

pub struct PeerToPeerProtocol;

#[async_trait]
impl ProtocolHandler for PeerToPeerProtocol {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::PeerToPeer
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
            .collect();

        if solutions.is_empty() {
            return Ok(Outcome::failed(
                collaboration_id.clone(),
                ProtocolKind::PeerToPeer,
                "no peer produced a solution",
            ));
        }

        let reviews = solutions.iter().map(|(agent, own)| {
            let peers: BTreeMap<&AgentId, &Value> = solutions.iter().filter(|(id, _)| *id != agent).collect();
            let request = ctx.messenger.message(
                MessageKind::Request,
                json!({
                    "action": "review",
                    "collaboration_id": collaboration_id,
                    "task": task,
                    "own_solution": own,
                    "peer_solutions": peers,
                }),
            );
            async move {
                let reply = ctx
                    .messenger
                    .request_and_wait(agent, request, ctx.params.request_timeout)
                    .await;
                (agent, reply.map(|r| reply_result(&r)))
            }
        });

        // Reviews run concurrently, each with its own timeout.
        let mut refined = solutions.clone();
        for (agent, revision) in join_all(reviews).await {
            match revision {
                Some(revision) => {
                    refined.insert(agent.clone(), revision);
                }
                None => warn!(agent = %agent, "No review; keeping original solution"),
            }
        }

        let agreement = pairwise_agreement_matrix(&refined).mean_agreement();
        info!(
            collaboration = %collaboration_id,
            peers = refined.len(),
            agreement,
            "Peer solutions reviewed"
        );

        let agent_results = solutions
            .iter()
            .map(|(agent, solution)| {
                let revision = refined.get(agent).cloned().unwrap_or(Value::Null);
                (agent.to_string(), json!({ "solution": solution, "refined": revision }))
            })
            .collect();

        Ok(
            Outcome::completed(collaboration_id.clone(), ProtocolKind::PeerToPeer, find_compromise(&refined))
                .with_agent_results(agent_results),
        )
    }
}
