//! Dependency-aware subtask scheduling.
//!
//! A subtask becomes eligible only once every one of its dependency ids is in
//! the completed set. [`DependencyScheduler`] validates the graph up front
//! (duplicate ids, unknown ids, cycles) and then hands out each subtask
//! exactly once.

use super::entities::{Task, TaskId};
use crate::core::error::DomainError;
use std::collections::{HashMap, HashSet};

/// Hands out subtasks in dependency order.
#[derive(Debug, Clone)]
pub struct DependencyScheduler {
    /// Subtask ids in their original order.
    order: Vec<TaskId>,
    dependencies: HashMap<TaskId, Vec<TaskId>>,
    started: HashSet<TaskId>,
}

impl DependencyScheduler {
    /// Build a scheduler, rejecting duplicate subtask ids, unknown dependency
    /// ids and cycles.
    pub fn new(subtasks: &[Task]) -> Result<Self, DomainError> {
        let order: Vec<TaskId> = subtasks.iter().map(|t| t.id.clone()).collect();
        let mut known: HashSet<&TaskId> = HashSet::with_capacity(order.len());
        for id in &order {
            if !known.insert(id) {
                return Err(DomainError::DuplicateTask(id.to_string()));
            }
        }

        let mut dependencies = HashMap::new();
        for subtask in subtasks {
            for dependency in &subtask.dependencies {
                if !known.contains(dependency) {
                    return Err(DomainError::UnknownDependency {
                        subtask: subtask.id.to_string(),
                        dependency: dependency.to_string(),
                    });
                }
            }
            dependencies.insert(subtask.id.clone(), subtask.dependencies.clone());
        }

        let scheduler = Self {
            order,
            dependencies,
            started: HashSet::new(),
        };

        let scheduled: usize = scheduler.waves().iter().map(Vec::len).sum();
        if scheduled != scheduler.order.len() {
            let in_waves: HashSet<TaskId> = scheduler.waves().into_iter().flatten().collect();
            let cyclic: Vec<String> = scheduler
                .order
                .iter()
                .filter(|id| !in_waves.contains(*id))
                .map(ToString::to_string)
                .collect();
            return Err(DomainError::DependencyCycle(cyclic.join(", ")));
        }

        Ok(scheduler)
    }

    /// Whether `id` has all of its dependencies in `completed`.
    pub fn is_eligible(&self, id: &TaskId, completed: &HashSet<TaskId>) -> bool {
        self.dependencies
            .get(id)
            .is_some_and(|deps| deps.iter().all(|d| completed.contains(d)))
    }

    /// Subtasks that are eligible and have not been handed out yet.
    ///
    /// Each returned id is marked as started and never returned again.
    pub fn ready(&mut self, completed: &HashSet<TaskId>) -> Vec<TaskId> {
        let ready: Vec<TaskId> = self
            .order
            .iter()
            .filter(|id| !self.started.contains(*id) && self.is_eligible(id, completed))
            .cloned()
            .collect();
        self.started.extend(ready.iter().cloned());
        ready
    }

    /// Subtasks that have not been handed out yet.
    pub fn pending(&self) -> Vec<TaskId> {
        self.order
            .iter()
            .filter(|id| !self.started.contains(*id))
            .cloned()
            .collect()
    }

    /// Topological layers: every subtask in wave `n` depends only on
    /// subtasks of earlier waves. Subtasks caught in a cycle are omitted.
    pub fn waves(&self) -> Vec<Vec<TaskId>> {
        let mut done: HashSet<TaskId> = HashSet::new();
        let mut waves = Vec::new();

        loop {
            let wave: Vec<TaskId> = self
                .order
                .iter()
                .filter(|id| !done.contains(*id) && self.is_eligible(id, &done))
                .cloned()
                .collect();
            if wave.is_empty() {
                break;
            }
            done.extend(wave.iter().cloned());
            waves.push(wave);
        }

        waves
    }
}
