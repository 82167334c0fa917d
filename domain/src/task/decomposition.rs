//! Task decomposition
//!
//! Turns a task into the list of subtasks that protocols distribute:
//!
//! 1. explicit subtasks, when the task carries any
//! 2. one subtask per required capability
//! 3. a generic analysis → planning → execution pipeline

use super::entities::{Task, TaskId};
use crate::agent::Capability;

/// Phases of the generic decomposition, in execution order.
const GENERIC_PHASES: [(&str, Capability); 3] = [
    ("analysis", Capability::Analysis),
    ("planning", Capability::Planning),
    ("execution", Capability::Execution),
];

/// Decompose a task into subtasks.
pub fn decompose(task: &Task) -> Vec<Task> {
    if !task.subtasks.is_empty() {
        return task.subtasks.clone();
    }

    if !task.required_capabilities.is_empty() {
        let mut seen = Vec::new();
        return task
            .required_capabilities
            .iter()
            .filter(|c| {
                if seen.contains(*c) {
                    false
                } else {
                    seen.push(**c);
                    true
                }
            })
            .enumerate()
            .map(|(i, capability)| {
                Task::new(
                    format!("{}.{}", task.id, i + 1),
                    format!("{} ({})", task.description, capability),
                )
                .with_capabilities([*capability])
                .with_context(task.context.clone())
            })
            .collect();
    }

    let mut previous: Option<TaskId> = None;
    GENERIC_PHASES
        .iter()
        .map(|(phase, capability)| {
            let mut subtask = Task::new(
                format!("{}.{}", task.id, phase),
                format!("{}: {}", phase, task.description),
            )
            .with_capabilities([*capability])
            .with_context(task.context.clone());
            if let Some(dependency) = previous.take() {
                subtask = subtask.with_dependency(dependency);
            }
            previous = Some(subtask.id.clone());
            subtask
        })
        .collect()
}
