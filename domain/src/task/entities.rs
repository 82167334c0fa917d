//! Task entities

use crate::agent::{AgentId, Capability};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unique identifier for a task or subtask.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Creates a TaskId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a new unique TaskId.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T: Into<String>> From<T> for TaskId {
    fn from(s: T) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Active,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Active => "active",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Hierarchical unit of work.
///
/// A task may carry explicit subtasks; subtasks reference their siblings
/// through `dependencies` and must form an acyclic graph
/// (see [`DependencyScheduler`](super::schedule::DependencyScheduler)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    #[serde(default)]
    pub required_capabilities: Vec<Capability>,
    #[serde(default)]
    pub subtasks: Vec<Task>,
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    #[serde(default)]
    pub assigned_agents: Vec<AgentId>,
    #[serde(default)]
    pub status: TaskStatus,
    /// Free-form input handed to agents along with the description.
    #[serde(default)]
    pub context: Value,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            required_capabilities: Vec::new(),
            subtasks: Vec::new(),
            dependencies: Vec::new(),
            assigned_agents: Vec::new(),
            status: TaskStatus::Pending,
            context: Value::Null,
        }
    }

    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.required_capabilities.extend(capabilities);
        self
    }

    pub fn with_subtask(mut self, subtask: Task) -> Self {
        self.subtasks.push(subtask);
        self
    }

    pub fn with_dependency(mut self, dependency: impl Into<TaskId>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    pub fn assign(&mut self, agent: AgentId) {
        if !self.assigned_agents.contains(&agent) {
            self.assigned_agents.push(agent);
        }
    }

    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
    }
}
