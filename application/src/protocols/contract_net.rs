//! Contract-net protocol
//!
//! For each subtask, in dependency order: call for proposals among capable
//! agents, award the subtask to the cheapest bid, await the result.

use super::dispatch::{SubtaskReport, completed_results, dispatch_in_waves, reports_by_subtask, run_subtask};
use super::messenger::{Messenger, reply_result};
use super::{ProtocolContext, ProtocolError, ProtocolHandler, agent_ids};
use async_trait::async_trait;
use concord_domain::{
    AgentId, AgentProfile, Message, MessageKind, Outcome, ProtocolKind, SessionId, Task, decompose,
};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct ContractNetProtocol;

#[async_trait]
impl ProtocolHandler for ContractNetProtocol {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::ContractNet
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

        let mut subtasks = decompose(task);
        let pool: Arc<[AgentProfile]> = agents.into();
        let reports = dispatch_in_waves(&mut subtasks, |subtask| {
            tender(
                ctx.messenger.clone(),
                Arc::clone(&pool),
                collaboration_id.clone(),
                subtask,
                ctx.params.request_timeout,
                ctx.params.subtask_timeout,
            )
        })
        .await?;

        let results = completed_results(&reports);
        let per_subtask = reports_by_subtask(&reports);
        if results.is_empty() {
            return Ok(Outcome::failed(
                collaboration_id.clone(),
                ProtocolKind::ContractNet,
                "no subtask was awarded and completed",
            )
            .with_agent_results(per_subtask));
        }

        Ok(
            Outcome::completed(collaboration_id.clone(), ProtocolKind::ContractNet, Value::Object(results))
                .with_agent_results(per_subtask),
        )
    }
}

/// One call for proposals, award and execution.
async fn tender(
    messenger: Messenger,
    pool: Arc<[AgentProfile]>,
    collaboration_id: SessionId,
    subtask: Task,
    bid_timeout: Duration,
    subtask_timeout: Duration,
) -> SubtaskReport {
    let bidders = bidders_for(&pool, &subtask);
    let replies = messenger
        .broadcast_and_collect(
            &bidders,
            MessageKind::CallForProposals,
            json!({
                "action": "bid",
                "collaboration_id": collaboration_id,
                "task": subtask,
            }),
            bid_timeout,
        )
        .await;

    let bids: BTreeMap<AgentId, f64> = replies
        .iter()
        .filter_map(|(agent, reply)| bid_cost(reply).map(|cost| (agent.clone(), cost)))
        .collect();
    let Some((winner, cost)) = lowest_bid(&bids) else {
        return SubtaskReport::unassigned(subtask.id, format!("no bids from {} agents", bidders.len()));
    };
    info!(subtask = %subtask.id, winner = %winner, cost, bids = bids.len(), "Subtask awarded");

    let losers: Vec<AgentId> = bids.keys().filter(|a| **a != winner).cloned().collect();
    messenger.inform(
        &losers,
        MessageKind::Inform,
        json!({ "action": "bid_rejected", "task_id": subtask.id, "winner": winner }),
    );

    let mut awarded = subtask;
    awarded.assign(winner.clone());
    let award = messenger.message(
        MessageKind::Award,
        json!({
            "action": "execute",
            "collaboration_id": collaboration_id,
            "task": awarded,
            "cost": cost,
        }),
    );
    run_subtask(messenger, awarded.id, winner, award, subtask_timeout).await
}

/// Agents covering any of the subtask's capabilities; everyone when nobody
/// does or nothing is required.
fn bidders_for(pool: &[AgentProfile], subtask: &Task) -> Vec<AgentId> {
    let capable: Vec<AgentId> = pool
        .iter()
        .filter(|a| a.capability_overlap(&subtask.required_capabilities) > 0)
        .map(|a| a.id.clone())
        .collect();
    if capable.is_empty() {
        agent_ids(pool)
    } else {
        capable
    }
}

/// A bid is a numeric `cost`, at the top level or under `result`. Anything
/// else is a decline.
fn bid_cost(reply: &Message) -> Option<f64> {
    let cost = reply
        .payload
        .get("cost")
        .cloned()
        .or_else(|| reply_result(reply).get("cost").cloned())?;
    let cost = cost.as_f64();
    if cost.is_none() {
        debug!(agent = %reply.sender, "Bid without a numeric cost treated as decline");
    }
    cost
}

/// Cheapest bid; equal costs go to the lowest agent id.
fn lowest_bid(bids: &BTreeMap<AgentId, f64>) -> Option<(AgentId, f64)> {
    bids.iter()
        .min_by(|(a_id, a_cost), (b_id, b_cost)| a_cost.total_cmp(b_cost).then_with(|| a_id.cmp(b_id)))
        .map(|(agent, cost)| (agent.clone(), *cost))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{harness, scripted};
    use concord_domain::Capability;

    #[tokio::test]
    async fn test_cheapest_bidder_wins() {
        let cheap = scripted("cheap", &[Capability::Coding])
            .on_action("bid", json!({ "cost": 2.0 }))
            .on_action("execute", json!({ "result": "cheap work" }));
        let pricey = scripted("pricey", &[Capability::Coding])
            .on_action("bid", json!({ "cost": 9 }))
            .on_action("execute", json!({ "result": "pricey work" }));
        let pricey_log = pricey.recorder();
        let h = harness(vec![cheap, pricey]);

        let task = Task::new("t", "build").with_capabilities([Capability::Coding]);
        let outcome = ContractNetProtocol
            .execute(&h.ctx, &h.session, &task, &h.profiles)
            .await
            .unwrap();

        assert!(outcome.is_completed());
        assert_eq!(outcome.result, Some(json!({ "t.1": "cheap work" })));
        assert_eq!(outcome.agent_results["t.1"]["agent"], "cheap");

        // The loser hears about it and is never awarded.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pricey_log.actions(), vec!["bid".to_string(), "bid_rejected".to_string()]);
    }

    #[tokio::test]
    async fn test_only_capable_agents_are_asked() {
        let coder = scripted("coder", &[Capability::Coding])
            .on_action("bid", json!({ "cost": 5 }))
            .on_action("execute", json!({ "result": "code" }));
        let writer = scripted("writer", &[Capability::Writing])
            .on_action("bid", json!({ "cost": 1 }))
            .on_action("execute", json!({ "result": "prose" }));
        let writer_log = writer.recorder();
        let h = harness(vec![coder, writer]);

        let task = Task::new("t", "code it").with_capabilities([Capability::Coding]);
        let outcome = ContractNetProtocol
            .execute(&h.ctx, &h.session, &task, &h.profiles)
            .await
            .unwrap();

        assert_eq!(outcome.agent_results["t.1"]["agent"], "coder");
        assert_eq!(writer_log.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_declines_leave_subtask_unassigned() {
        let h = harness(vec![
            scripted("a", &[]).on_action("bid", json!({ "decline": true })),
            scripted("b", &[]).on_action("bid", json!({ "cost": "a lot" })),
        ]);

        let outcome = ContractNetProtocol
            .execute(&h.ctx, &h.session, &Task::new("t", "t").with_subtask(Task::new("s", "s")), &h.profiles)
            .await
            .unwrap();

        assert!(outcome.is_failed());
        assert_eq!(outcome.agent_results["s"]["status"], "unassigned");
    }

    #[test]
    fn test_lowest_bid_ties_go_to_lowest_id() {
        let bids = BTreeMap::from([
            (AgentId::new("c"), 1.0),
            (AgentId::new("b"), 1.0),
            (AgentId::new("a"), 3.0),
        ]);
        assert_eq!(lowest_bid(&bids), Some((AgentId::new("b"), 1.0)));
        assert_eq!(lowest_bid(&BTreeMap::new()), None);
    }
}
