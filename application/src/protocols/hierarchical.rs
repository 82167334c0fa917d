//! Hierarchical protocol
//!
//! A leader plans, workers execute, the leader synthesizes.
//!
//! ```text
//! SelectLeader ──▶ PlanRequested ──▶ SubtasksDispatched ──▶ ResultsAggregated ──▶ Done
//!                        │                    │
//!                        └── no plan ──┬──────┘ nothing completed
//!                                      ▼
//!                                   Failed
//! ```

use super::dispatch::{completed_results, dispatch_in_waves, reports_by_subtask, run_subtask};
use super::messenger::reply_result;
use super::{ProtocolContext, ProtocolError, ProtocolHandler};
use async_trait::async_trait;
use concord_domain::{
    AgentId, AgentProfile, DependencyScheduler, MessageKind, Outcome, ProtocolKind, SessionId, Task,
    TaskId, best_assignee, decompose, select_leader,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Phases of one hierarchical run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HierarchicalPhase {
    SelectLeader,
    PlanRequested,
    SubtasksDispatched,
    ResultsAggregated,
    Done,
    Failed,
}

impl HierarchicalPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            HierarchicalPhase::SelectLeader => "select_leader",
            HierarchicalPhase::PlanRequested => "plan_requested",
            HierarchicalPhase::SubtasksDispatched => "subtasks_dispatched",
            HierarchicalPhase::ResultsAggregated => "results_aggregated",
            HierarchicalPhase::Done => "done",
            HierarchicalPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, HierarchicalPhase::Done | HierarchicalPhase::Failed)
    }
}

impl std::fmt::Display for HierarchicalPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn enter(collaboration_id: &SessionId, phase: HierarchicalPhase) {
    debug!(collaboration = %collaboration_id, phase = %phase, "Hierarchical phase");
}

pub struct HierarchicalProtocol;

#[async_trait]
impl ProtocolHandler for HierarchicalProtocol {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Hierarchical
    }

    async fn execute(
        &self,
        ctx: &ProtocolContext,
        collaboration_id: &SessionId,
        task: &Task,
        agents: &[AgentProfile],
    ) -> Result<Outcome, ProtocolError> {
        let mut subtasks = decompose(task);
        DependencyScheduler::new(&subtasks)?;

        enter(collaboration_id, HierarchicalPhase::SelectLeader);
        let leader = select_leader(agents, &task.required_capabilities)
            .ok_or(ProtocolError::NoParticipants)?
            .id
            .clone();
        info!(collaboration = %collaboration_id, leader = %leader, "Leader selected");

        // ===== Plan =====
        enter(collaboration_id, HierarchicalPhase::PlanRequested);
        let plan_request = ctx.messenger.message(
            MessageKind::Request,
            json!({
                "action": "plan",
                "collaboration_id": collaboration_id,
                "task": task,
                "subtasks": subtasks,
                "agents": agents,
            }),
        );
        let timeout = ctx.params.plan_timeout;
        let Some(plan) = ctx.messenger.request_and_wait(&leader, plan_request, timeout).await else {
            enter(collaboration_id, HierarchicalPhase::Failed);
            return Ok(Outcome::failed(
                collaboration_id.clone(),
                ProtocolKind::Hierarchical,
                format!("leader failed to create plan: {leader} did not reply within {timeout:?}"),
            ));
        };
        let assignments = assign_subtasks(&reply_result(&plan), &subtasks, agents);

        // ===== Dispatch =====
        enter(collaboration_id, HierarchicalPhase::SubtasksDispatched);
        let messenger = ctx.messenger.clone();
        let subtask_timeout = ctx.params.subtask_timeout;
        let reports = dispatch_in_waves(&mut subtasks, |mut subtask| {
            let messenger = messenger.clone();
            let agent = assignments
                .get(&subtask.id)
                .cloned()
                .unwrap_or_else(|| leader.clone());
            subtask.assign(agent.clone());
            let message = messenger.message(
                MessageKind::TaskAssignment,
                json!({
                    "action": "execute",
                    "collaboration_id": collaboration_id,
                    "task": subtask,
                }),
            );
            run_subtask(messenger, subtask.id, agent, message, subtask_timeout)
        })
        .await?;

        let results = completed_results(&reports);
        let per_subtask = reports_by_subtask(&reports);
        if results.is_empty() {
            enter(collaboration_id, HierarchicalPhase::Failed);
            return Ok(Outcome::failed(
                collaboration_id.clone(),
                ProtocolKind::Hierarchical,
                "no subtask completed",
            )
            .with_agent_results(per_subtask));
        }

        // ===== Synthesize =====
        enter(collaboration_id, HierarchicalPhase::ResultsAggregated);
        let synthesis_request = ctx.messenger.message(
            MessageKind::Request,
            json!({
                "action": "synthesize",
                "collaboration_id": collaboration_id,
                "task": task,
                "results": results,
            }),
        );
        let result = match ctx
            .messenger
            .request_and_wait(&leader, synthesis_request, ctx.params.synthesis_timeout)
            .await
        {
            Some(reply) => reply_result(&reply),
            None => {
                warn!(leader = %leader, "Leader did not synthesize; returning raw subtask results");
                Value::Object(results)
            }
        };

        enter(collaboration_id, HierarchicalPhase::Done);
        Ok(Outcome::completed(collaboration_id.clone(), ProtocolKind::Hierarchical, result)
            .with_agent_results(per_subtask))
    }
}

/// Read the leader's plan and fill its gaps.
///
/// The plan is an object of subtask id → agent id, either bare or under an
/// `assignments` key. Subtasks the plan skips, or gives to an agent outside
/// `agents`, go to the best capability match.
fn assign_subtasks(plan: &Value, subtasks: &[Task], agents: &[AgentProfile]) -> HashMap<TaskId, AgentId> {
    let planned = plan
        .get("assignments")
        .and_then(Value::as_object)
        .or_else(|| plan.as_object());

    let mut load: HashMap<AgentId, usize> = HashMap::new();
    let mut assignments = HashMap::new();
    let mut unplanned = Vec::new();

    for subtask in subtasks {
        let chosen = planned
            .and_then(|p| p.get(subtask.id.as_str()))
            .and_then(Value::as_str)
            .and_then(|id| agents.iter().find(|a| a.id.as_str() == id));
        match chosen {
            Some(agent) => {
                *load.entry(agent.id.clone()).or_default() += 1;
                assignments.insert(subtask.id.clone(), agent.id.clone());
            }
            None => unplanned.push(subtask),
        }
    }

    for subtask in unplanned {
        if let Some(agent) = best_assignee(agents, &subtask.required_capabilities, &load) {
            debug!(subtask = %subtask.id, agent = %agent.id, "Plan gap filled by capability match");
            *load.entry(agent.id.clone()).or_default() += 1;
            assignments.insert(subtask.id.clone(), agent.id.clone());
        }
    }
    assignments
}
