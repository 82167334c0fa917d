//! Dependency-ordered subtask dispatch.
//!
//! Subtasks run in waves: every subtask whose dependencies have completed is
//! started at once, each with its own timeout. A subtask that does not
//! complete never unblocks its dependants; its siblings are unaffected.
//! Each subtask's [`TaskStatus`] follows its run: active once dispatched,
//! then completed or failed from its report. Blocked subtasks stay pending.

use super::messenger::{Messenger, reply_result};
use concord_domain::{AgentId, DependencyScheduler, DomainError, Message, Task, TaskId, TaskStatus};
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    Completed,
    Failed,
    TimedOut,
    /// Nobody could be given the subtask
    Unassigned,
    /// A dependency never completed
    Blocked,
}

/// What happened to one subtask.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtaskReport {
    pub subtask: TaskId,
    pub status: SubtaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SubtaskReport {
    fn with_status(subtask: TaskId, status: SubtaskStatus, agent: Option<AgentId>) -> Self {
        Self {
            subtask,
            status,
            agent,
            result: None,
            detail: None,
        }
    }

    pub fn completed(subtask: TaskId, agent: AgentId, result: Value) -> Self {
        let mut report = Self::with_status(subtask, SubtaskStatus::Completed, Some(agent));
        report.result = Some(result);
        report
    }

    pub fn failed(subtask: TaskId, agent: AgentId, detail: impl Into<String>) -> Self {
        let mut report = Self::with_status(subtask, SubtaskStatus::Failed, Some(agent));
        report.detail = Some(detail.into());
        report
    }

    pub fn timed_out(subtask: TaskId, agent: AgentId) -> Self {
        Self::with_status(subtask, SubtaskStatus::TimedOut, Some(agent))
    }

    pub fn unassigned(subtask: TaskId, detail: impl Into<String>) -> Self {
        let mut report = Self::with_status(subtask, SubtaskStatus::Unassigned, None);
        report.detail = Some(detail.into());
        report
    }

    pub fn blocked(subtask: TaskId) -> Self {
        Self::with_status(subtask, SubtaskStatus::Blocked, None)
    }

    /// A run that ended without producing a report of its own.
    fn aborted(subtask: TaskId, detail: impl Into<String>) -> Self {
        let mut report = Self::with_status(subtask, SubtaskStatus::Failed, None);
        report.detail = Some(detail.into());
        report
    }

    pub fn is_completed(&self) -> bool {
        self.status == SubtaskStatus::Completed
    }

    /// Lifecycle status of the subtask this report describes.
    pub fn task_status(&self) -> TaskStatus {
        match self.status {
            SubtaskStatus::Completed => TaskStatus::Completed,
            SubtaskStatus::Blocked => TaskStatus::Pending,
            SubtaskStatus::Failed | SubtaskStatus::TimedOut | SubtaskStatus::Unassigned => TaskStatus::Failed,
        }
    }
}

/// Run `subtasks` wave by wave through `run`, updating their statuses.
///
/// Fails up front on duplicate or unknown ids and on cycles. Subtasks left
/// waiting on an incomplete dependency are reported as blocked. A run that
/// panics is reported as failed.
pub(crate) async fn dispatch_in_waves<F, Fut>(subtasks: &mut [Task], mut run: F) -> Result<Vec<SubtaskReport>, DomainError>
where
    F: FnMut(Task) -> Fut,
    Fut: Future<Output = SubtaskReport> + Send + 'static,
{
    let mut scheduler = DependencyScheduler::new(subtasks)?;
    let index: HashMap<TaskId, usize> = subtasks.iter().enumerate().map(|(i, t)| (t.id.clone(), i)).collect();
    let mut completed: HashSet<TaskId> = HashSet::new();
    let mut reports = Vec::with_capacity(subtasks.len());

    loop {
        let wave = scheduler.ready(&completed);
        if wave.is_empty() {
            break;
        }
        debug!(wave = ?wave, "Dispatching wave");

        let mut join_set = JoinSet::new();
        let mut in_flight: HashSet<TaskId> = HashSet::new();
        for id in &wave {
            let Some(&i) = index.get(id) else {
                continue;
            };
            subtasks[i].set_status(TaskStatus::Active);
            let id = id.clone();
            let running = AssertUnwindSafe(run(subtasks[i].clone())).catch_unwind();
            in_flight.insert(id.clone());
            join_set.spawn(async move {
                running.await.unwrap_or_else(|_| {
                    warn!(subtask = %id, "Subtask run panicked");
                    SubtaskReport::aborted(id, "subtask run panicked")
                })
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(report) => {
                    in_flight.remove(&report.subtask);
                    if report.is_completed() {
                        completed.insert(report.subtask.clone());
                    } else {
                        warn!(subtask = %report.subtask, status = ?report.status, "Subtask did not complete");
                    }
                    reports.push(report);
                }
                Err(e) => warn!("Subtask task join error: {}", e),
            }
        }

        // Runs that vanished without a report.
        for id in in_flight {
            reports.push(SubtaskReport::aborted(id, "subtask run ended without a report"));
        }
    }

    for id in scheduler.pending() {
        reports.push(SubtaskReport::blocked(id));
    }

    for report in &reports {
        if let Some(&i) = index.get(&report.subtask) {
            if let Some(agent) = &report.agent {
                subtasks[i].assign(agent.clone());
            }
            subtasks[i].set_status(report.task_status());
        }
    }
    Ok(reports)
}

/// Send `message` to `agent` and turn its reply into a report.
///
/// A reply carrying an `error` field counts as failed; no reply in time
/// counts as timed out.
pub(crate) async fn run_subtask(
    messenger: Messenger,
    subtask: TaskId,
    agent: AgentId,
    message: Message,
    timeout: Duration,
) -> SubtaskReport {
    match messenger.request_and_wait(&agent, message, timeout).await {
        Some(reply) => match reply.payload.get("error") {
            Some(error) => {
                let detail = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
                SubtaskReport::failed(subtask, agent, detail)
            }
            None => SubtaskReport::completed(subtask, agent, reply_result(&reply)),
        },
        None => SubtaskReport::timed_out(subtask, agent),
    }
}

/// Reports keyed by subtask id, for an outcome's per-subtask results.
pub(crate) fn reports_by_subtask(reports: &[SubtaskReport]) -> BTreeMap<String, Value> {
    reports
        .iter()
        .map(|r| {
            let value = serde_json::to_value(r).unwrap_or(Value::Null);
            (r.subtask.to_string(), value)
        })
        .collect()
}

/// Results of completed subtasks, keyed by subtask id.
pub(crate) fn completed_results(reports: &[SubtaskReport]) -> serde_json::Map<String, Value> {
    reports
        .iter()
        .filter(|r| r.is_completed())
        .map(|r| (r.subtask.to_string(), r.result.clone().unwrap_or(Value::Null)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn subtask(id: &str, deps: &[&str]) -> Task {
        deps.iter()
            .fold(Task::new(id, id), |t, d| t.with_dependency(*d))
    }

    #[tokio::test]
    async fn test_failed_subtask_blocks_only_dependants() {
        let mut subtasks = vec![
            subtask("a", &[]),
            subtask("b", &[]),
            subtask("c", &["a"]),
            subtask("d", &["b"]),
        ];

        let reports = dispatch_in_waves(&mut subtasks, |t| async move {
            if t.id.as_str() == "a" {
                SubtaskReport::timed_out(t.id, AgentId::new("w"))
            } else {
                SubtaskReport::completed(t.id.clone(), AgentId::new("w"), json!(t.id.as_str()))
            }
        })
        .await
        .unwrap();

        let by_id = reports_by_subtask(&reports);
        assert_eq!(by_id["a"]["status"], "timed_out");
        assert_eq!(by_id["b"]["status"], "completed");
        assert_eq!(by_id["c"]["status"], "blocked");
        assert_eq!(by_id["d"]["status"], "completed");
        assert_eq!(completed_results(&reports).len(), 2);

        let statuses: Vec<TaskStatus> = subtasks.iter().map(|t| t.status).collect();
        assert_eq!(
            statuses,
            vec![TaskStatus::Failed, TaskStatus::Completed, TaskStatus::Pending, TaskStatus::Completed]
        );
        assert_eq!(subtasks[1].assigned_agents, vec![AgentId::new("w")]);
    }

    #[tokio::test]
    async fn test_subtasks_are_active_while_running() {
        let mut subtasks = vec![subtask("a", &[])];
        let seen = std::sync::Arc::new(std::sync::Mutex::new(None));

        let status = std::sync::Arc::clone(&seen);
        dispatch_in_waves(&mut subtasks, move |t| {
            *status.lock().unwrap() = Some(t.status);
            async move { SubtaskReport::completed(t.id, AgentId::new("w"), json!(1)) }
        })
        .await
        .unwrap();

        assert_eq!(*seen.lock().unwrap(), Some(TaskStatus::Active));
        assert_eq!(subtasks[0].status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_panicking_run_is_reported_failed() {
        let mut subtasks = vec![subtask("boom", &[]), subtask("fine", &[]), subtask("after", &["boom"])];

        let reports = dispatch_in_waves(&mut subtasks, |t| async move {
            if t.id.as_str() == "boom" {
                panic!("worker bug");
            }
            SubtaskReport::completed(t.id, AgentId::new("w"), json!(null))
        })
        .await
        .unwrap();

        assert_eq!(reports.len(), 3);
        let by_id = reports_by_subtask(&reports);
        assert_eq!(by_id["boom"]["status"], "failed");
        assert_eq!(by_id["boom"]["detail"], "subtask run panicked");
        assert_eq!(by_id["fine"]["status"], "completed");
        assert_eq!(by_id["after"]["status"], "blocked");
        assert_eq!(subtasks[0].status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_duplicate_ids_are_rejected() {
        let mut subtasks = vec![subtask("a", &[]), subtask("a", &[])];
        let err = dispatch_in_waves(&mut subtasks, |t| async move { SubtaskReport::blocked(t.id) })
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::DuplicateTask("a".to_string()));
    }

    #[tokio::test]
    async fn test_dependencies_finish_first() {
        let mut subtasks = vec![subtask("late", &["early"]), subtask("early", &[])];
        let order = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));

        let seen = std::sync::Arc::clone(&order);
        dispatch_in_waves(&mut subtasks, move |t| {
            seen.lock().unwrap().push(t.id.to_string());
            async move { SubtaskReport::completed(t.id, AgentId::new("w"), json!(null)) }
        })
        .await
        .unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["early".to_string(), "late".to_string()]);
    }

    #[tokio::test]
    async fn test_cycle_is_rejected() {
        let mut subtasks = vec![subtask("a", &["b"]), subtask("b", &["a"])];
        let err = dispatch_in_waves(&mut subtasks, |t| async move { SubtaskReport::blocked(t.id) })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::DependencyCycle(_)));
    }
}
