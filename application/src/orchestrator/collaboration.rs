//! Collaboration orchestrator
//!
//! Composition root of the engine. One instance owns the message bus, the
//! agent registry, shared workspaces, active sessions and metrics; nothing
//! lives in process-wide state.
//!
//! ```text
//! orchestrate_task(task, protocol)
//!   select_agents ──none──▶ failed "no capable agent"
//!        │
//!   open session ──▶ registry[protocol] ──missing──▶ failed "protocol not found"
//!        │                   │
//!        │             spawned handler ──error / panic──▶ failed
//!        ▼                   ▼
//!   close session ◀──── Outcome
//! ```

use super::error::OrchestratorError;
use crate::bus::MessageBus;
use crate::config::CollaborationParams;
use crate::ports::agent::Agent;
use crate::ports::collaboration_logger::{CollaborationEvent, CollaborationLogger, NoCollaborationLogger};
use crate::protocols::{Messenger, ProtocolContext, ProtocolError, ProtocolHandler, ProtocolRegistry};
use crate::runtime::{AgentHandle, AgentRuntime};
use crate::shared_workspace::SharedWorkspace;
use crate::sync::{lock, read, write};
use crate::use_cases::negotiate_consensus::{NegotiateConsensusInput, NegotiateConsensusUseCase};
use concord_domain::{
    AgentId, AgentProfile, AllocationResult, Assignment, CollaborationMetrics, CollaborationSession,
    ConsensusResult, Outcome, ProtocolKind, SessionId, SessionStatus, Task, TaskStatus, WorkspaceId,
    best_assignee, decompose, select_agents,
};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

struct RegisteredAgent {
    agent: Arc<dyn Agent>,
    handle: AgentHandle,
}

impl RegisteredAgent {
    /// The agent's current profile under the id it registered with.
    fn profile(&self, id: &AgentId) -> AgentProfile {
        let mut profile = self.agent.profile();
        profile.id = id.clone();
        profile
    }
}

/// Removes a session from the active registry however the run ends,
/// including when the caller drops the future.
struct SessionGuard<'a> {
    sessions: &'a Mutex<HashMap<SessionId, CollaborationSession>>,
    id: SessionId,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        lock(self.sessions).remove(&self.id);
    }
}

pub struct CollaborationOrchestrator {
    bus: Arc<MessageBus>,
    messenger: Messenger,
    params: CollaborationParams,
    protocols: ProtocolRegistry,
    agents: RwLock<BTreeMap<AgentId, RegisteredAgent>>,
    workspaces: Mutex<HashMap<WorkspaceId, Arc<SharedWorkspace>>>,
    sessions: Mutex<HashMap<SessionId, CollaborationSession>>,
    metrics: Mutex<CollaborationMetrics>,
    logger: Arc<dyn CollaborationLogger>,
    shutdown: CancellationToken,
}

impl CollaborationOrchestrator {
    /// An orchestrator with every built-in protocol.
    pub fn new(params: CollaborationParams) -> Self {
        let bus = Arc::new(MessageBus::new(params.queue_capacity));
        let messenger = Messenger::new(Arc::clone(&bus));
        Self {
            bus,
            messenger,
            params,
            protocols: ProtocolRegistry::with_defaults(),
            agents: RwLock::new(BTreeMap::new()),
            workspaces: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            metrics: Mutex::new(CollaborationMetrics::new()),
            logger: Arc::new(NoCollaborationLogger),
            shutdown: CancellationToken::new(),
        }
    }

    // ==================== Builder Methods ====================

    pub fn with_logger(mut self, logger: Arc<dyn CollaborationLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Register `handler`, replacing any handler of the same kind.
    pub fn with_protocol(mut self, handler: Arc<dyn ProtocolHandler>) -> Self {
        self.protocols.register(handler);
        self
    }

    pub fn with_protocols(mut self, protocols: ProtocolRegistry) -> Self {
        self.protocols = protocols;
        self
    }

    // ==================== Accessors ====================

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn params(&self) -> &CollaborationParams {
        &self.params
    }

    pub fn protocols(&self) -> &ProtocolRegistry {
        &self.protocols
    }

    /// Current profiles of the registered agents, ordered by id.
    pub fn agents(&self) -> Vec<AgentProfile> {
        read(&self.agents).iter().map(|(id, a)| a.profile(id)).collect()
    }

    pub fn active_sessions(&self) -> Vec<CollaborationSession> {
        lock(&self.sessions).values().cloned().collect()
    }

    pub fn metrics(&self) -> CollaborationMetrics {
        lock(&self.metrics).clone()
    }

    fn context(&self) -> ProtocolContext {
        ProtocolContext::new(self.messenger.clone(), self.params.clone()).with_logger(Arc::clone(&self.logger))
    }

    // ==================== Agents ====================

    /// Register `agent` and start its message loop.
    pub fn register_agent(&self, agent: Arc<dyn Agent>) -> Result<AgentId, OrchestratorError> {
        let profile = agent.profile();
        let id = profile.id.clone();
        if id.is_system() {
            return Err(OrchestratorError::ReservedAgentId(id));
        }

        let mut agents = write(&self.agents);
        if agents.contains_key(&id) {
            return Err(OrchestratorError::DuplicateAgent(id));
        }

        self.bus.register(id.clone());
        let handle = AgentRuntime::spawn(Arc::clone(&agent), Arc::clone(&self.bus), self.shutdown.child_token());
        info!(agent = %id, capabilities = ?profile.capabilities, "Agent registered");
        agents.insert(id.clone(), RegisteredAgent { agent, handle });
        Ok(id)
    }

    /// Stop `agent`, drop its inbox and release its workspace locks.
    pub fn unregister_agent(&self, agent: &AgentId) -> Result<AgentProfile, OrchestratorError> {
        let registered = write(&self.agents)
            .remove(agent)
            .ok_or_else(|| OrchestratorError::UnknownAgent(agent.clone()))?;
        registered.handle.cancel();
        self.bus.unregister(agent);

        for workspace in lock(&self.workspaces).values() {
            workspace.remove_participant(agent);
        }
        info!(agent = %agent, "Agent unregistered");
        Ok(registered.profile(agent))
    }

    /// Registered agents able to work on `task`.
    pub fn select_agents(&self, task: &Task) -> Vec<AgentProfile> {
        select_agents(&self.agents(), task, self.params.fallback_agent_count)
    }

    // ==================== Workspaces ====================

    /// Create a workspace shared by `participants`. Unknown agent ids are
    /// skipped.
    pub fn create_shared_workspace(&self, name: impl Into<String>, participants: &[AgentId]) -> Arc<SharedWorkspace> {
        let known: Vec<AgentId> = {
            let agents = read(&self.agents);
            participants
                .iter()
                .filter(|id| {
                    let known = agents.contains_key(*id);
                    if !known {
                        warn!(agent = %id, "Skipping unknown workspace participant");
                    }
                    known
                })
                .cloned()
                .collect()
        };

        let workspace = Arc::new(SharedWorkspace::new(name, known));
        info!(workspace = %workspace.id(), name = workspace.name(), "Workspace created");
        lock(&self.workspaces).insert(workspace.id().clone(), Arc::clone(&workspace));
        workspace
    }

    pub fn workspace(&self, id: &WorkspaceId) -> Result<Arc<SharedWorkspace>, OrchestratorError> {
        lock(&self.workspaces)
            .get(id)
            .cloned()
            .ok_or_else(|| OrchestratorError::UnknownWorkspace(id.clone()))
    }

    /// Empty a workspace's data and locks. Its history is kept.
    pub fn clear_workspace(&self, id: &WorkspaceId) -> Result<(), OrchestratorError> {
        self.workspace(id)?.clear(&AgentId::system());
        Ok(())
    }

    // ==================== Collaboration ====================

    /// Run `task` under `protocol` with the agents able to work on it.
    ///
    /// Never fails: every fault comes back as a failed outcome. While the
    /// session is listed in [`active_sessions`](Self::active_sessions) its
    /// task is `Active`.
    pub async fn orchestrate_task(&self, mut task: Task, protocol: ProtocolKind) -> Outcome {
        let selected = self.select_agents(&task);
        if selected.is_empty() {
            warn!(task = %task.id, "No capable agent");
            return Outcome::failed(SessionId::generate(), protocol, "no capable agent");
        }

        let participants: Vec<AgentId> = selected.iter().map(|a| a.id.clone()).collect();
        task.set_status(TaskStatus::Active);
        let session = CollaborationSession::new(task.clone(), protocol, participants.clone());
        let session_id = session.id.clone();
        lock(&self.sessions).insert(session_id.clone(), session);
        let _guard = SessionGuard {
            sessions: &self.sessions,
            id: session_id.clone(),
        };

        lock(&self.metrics).record_session_started(protocol);
        info!(session = %session_id, task = %task.id, protocol = %protocol, agents = participants.len(), "Session started");
        self.logger.log(CollaborationEvent::new(
            "session_started",
            json!({
                "session_id": session_id,
                "task_id": task.id,
                "protocol": protocol,
                "participants": participants,
            }),
        ));

        let started = Instant::now();
        let outcome = match self.protocols.get(protocol) {
            Some(handler) => self.run_handler(handler, &session_id, task, selected).await,
            None => Outcome::failed(session_id.clone(), protocol, "protocol not found"),
        };
        let elapsed = started.elapsed();

        let status = if outcome.is_failed() {
            SessionStatus::Failed
        } else {
            SessionStatus::Completed
        };
        if let Some(session) = lock(&self.sessions).get_mut(&session_id) {
            session.finish(status);
        }
        lock(&self.metrics).record_outcome(&outcome, elapsed);

        if outcome.is_failed() {
            warn!(session = %session_id, reason = ?outcome.reason, "Session failed");
        } else {
            info!(session = %session_id, status = %outcome.status, ?elapsed, "Session finished");
        }
        self.logger.log(CollaborationEvent::new(
            "session_finished",
            json!({
                "session_id": session_id,
                "protocol": protocol,
                "status": outcome.status,
                "session_status": status,
                "reason": outcome.reason,
                "elapsed_ms": elapsed.as_millis() as u64,
            }),
        ));
        outcome
    }

    /// Run `handler` on its own task so that neither an error nor a panic
    /// escapes. Dropping the returned future cancels the run.
    async fn run_handler(
        &self,
        handler: Arc<dyn ProtocolHandler>,
        session_id: &SessionId,
        task: Task,
        agents: Vec<AgentProfile>,
    ) -> Outcome {
        let protocol = handler.kind();
        let ctx = self.context();
        let cancel = self.shutdown.child_token();
        let _cancel_on_drop = cancel.clone().drop_guard();

        let id = session_id.clone();
        let joined = tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => None,
                result = handler.execute(&ctx, &id, &task, &agents) => Some(result),
            }
        })
        .await;

        match joined {
            Ok(Some(Ok(outcome))) => outcome,
            Ok(Some(Err(e))) => Outcome::failed(session_id.clone(), protocol, format!("protocol execution error: {e}")),
            Ok(None) => Outcome::failed(session_id.clone(), protocol, "session cancelled"),
            Err(e) if e.is_panic() => Outcome::failed(session_id.clone(), protocol, "protocol handler panicked"),
            Err(e) => Outcome::failed(session_id.clone(), protocol, format!("protocol handler aborted: {e}")),
        }
    }

    /// Negotiate `decision` among `participants` for up to `max_rounds`.
    ///
    /// Unknown ids are skipped.
    pub async fn negotiate_consensus(&self, participants: &[AgentId], decision: Value, max_rounds: usize) -> ConsensusResult {
        let known: Vec<AgentId> = {
            let agents = read(&self.agents);
            participants
                .iter()
                .filter(|id| {
                    let known = agents.contains_key(*id);
                    if !known {
                        warn!(agent = %id, "Skipping unknown negotiation participant");
                    }
                    known
                })
                .cloned()
                .collect()
        };

        let use_case =
            NegotiateConsensusUseCase::new(self.messenger.clone(), self.params.clone()).with_logger(Arc::clone(&self.logger));
        let result = use_case
            .execute(NegotiateConsensusInput::new(known.clone(), decision).with_max_rounds(max_rounds))
            .await;

        lock(&self.metrics).record_negotiation(result.consensus_reached);
        self.logger.log(CollaborationEvent::new(
            "negotiation_finished",
            json!({
                "participants": known,
                "consensus_reached": result.consensus_reached,
                "decision": result.decision,
                "agreement_level": result.agreement_level,
                "rounds": result.rounds,
            }),
        ));
        result
    }

    /// Plan who would do which subtask of `task`, without running anything.
    pub fn allocate_task(&self, task: &Task, protocol: ProtocolKind) -> AllocationResult {
        let session_id = SessionId::generate();
        let selected = self.select_agents(task);
        if selected.is_empty() {
            return AllocationResult::failed(session_id, protocol, "no capable agent");
        }

        let mut load: HashMap<AgentId, usize> = HashMap::new();
        let assignments: Vec<Assignment> = decompose(task)
            .into_iter()
            .filter_map(|subtask| {
                let agent = best_assignee(&selected, &subtask.required_capabilities, &load)?;
                *load.entry(agent.id.clone()).or_default() += 1;
                Some(Assignment {
                    overlap: agent.capability_overlap(&subtask.required_capabilities),
                    agent: agent.id.clone(),
                    subtask: subtask.id,
                })
            })
            .collect();

        let selected_ids: Vec<AgentId> = selected.into_iter().map(|a| a.id).collect();
        lock(&self.metrics).record_allocation();
        info!(task = %task.id, protocol = %protocol, subtasks = assignments.len(), "Task allocated");
        self.logger.log(CollaborationEvent::new(
            "allocation",
            json!({
                "session_id": session_id,
                "task_id": task.id,
                "protocol": protocol,
                "assignments": assignments,
            }),
        ));
        AllocationResult::allocated(session_id, protocol, selected_ids, assignments)
    }

    /// Cancel running sessions and stop every agent loop.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let agents = std::mem::take(&mut *write(&self.agents));
        for (id, agent) in agents {
            agent.handle.shutdown().await;
            self.bus.unregister(&id);
        }
        info!("Orchestrator shut down");
    }
}

impl Drop for CollaborationOrchestrator {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
