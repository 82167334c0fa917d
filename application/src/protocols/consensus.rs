//! Consensus protocol: a multi-round negotiation over the task itself.

use super::{ProtocolContext, ProtocolError, ProtocolHandler, agent_ids};
use crate::use_cases::negotiate_consensus::{NegotiateConsensusInput, NegotiateConsensusUseCase};
use async_trait::async_trait;
use concord_domain::{AgentProfile, Outcome, ProtocolKind, SessionId, Task};
use serde_json::{Value, json};

pub struct ConsensusProtocol;

#[async_trait]
impl ProtocolHandler for ConsensusProtocol {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Consensus
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

        let use_case = NegotiateConsensusUseCase::new(ctx.messenger.clone(), ctx.params.clone())
            .with_logger(ctx.logger.clone());
        let input = NegotiateConsensusInput::new(
            agent_ids(agents),
            json!({ "collaboration_id": collaboration_id, "task": task }),
        )
        .with_max_rounds(ctx.params.max_rounds);
        let result = use_case.execute(input).await;

        let agent_results = result
            .proposals
            .iter()
            .map(|(agent, proposal)| (agent.to_string(), proposal.clone()))
            .collect();

        let outcome = if result.consensus_reached {
            Outcome::completed(
                collaboration_id.clone(),
                ProtocolKind::Consensus,
                result.decision.clone().unwrap_or(Value::Null),
            )
        } else {
            let reason = match &result.decision {
                Some(_) => format!(
                    "vote on the leading proposal reached only {:.0}% agreement",
                    result.agreement_level * 100.0
                ),
                None => format!("no consensus after {} rounds", result.rounds),
            };
            Outcome::failed(collaboration_id.clone(), ProtocolKind::Consensus, reason)
        };
        Ok(outcome.with_agent_results(agent_results))
    }
}
