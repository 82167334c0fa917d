//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Unknown capability: {0}")]
    InvalidCapability(String),

    #[error("Unknown protocol: {0}")]
    InvalidProtocol(String),

    #[error("Subtask {subtask} depends on unknown task {dependency}")]
    UnknownDependency { subtask: String, dependency: String },

    #[error("Duplicate subtask id: {0}")]
    DuplicateTask(String),

    #[error("Dependency cycle detected among subtasks: {0}")]
    DependencyCycle(String),

    #[error("Key not present in workspace: {0}")]
    MissingKey(String),

    #[error("Resource {resource} is not locked by {actor}")]
    NotLockHolder { resource: String, actor: String },
}

impl DomainError {
    /// Shorthand for a [`DomainError::NotFound`] error.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        DomainError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Check if this error represents a missing entity
    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let error = DomainError::not_found("workspace", "ws-1");
        assert_eq!(error.to_string(), "workspace not found: ws-1");
        assert!(error.is_not_found());
    }

    #[test]
    fn test_is_not_found_check() {
        assert!(!DomainError::MissingKey("k".to_string()).is_not_found());
        assert!(!DomainError::DependencyCycle("a -> b -> a".to_string()).is_not_found());
    }
}
