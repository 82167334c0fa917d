//! Shared workspace state.
//!
//! [`Workspace`] is plain state with `&mut self` operations; the application
//! layer wraps it in a single mutex so every mutation is serialized.
//!
//! # Invariants
//!
//! - A resource has at most one lock holder; only the holder may release it.
//! - Removing a participant releases every lock it held.
//! - History is append-only and survives [`Workspace::clear`].

use crate::agent::AgentId;
use crate::core::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Unique identifier for a [`Workspace`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of audited mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceAction {
    Put,
    Update,
    Delete,
    Clear,
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: WorkspaceAction,
    /// Empty for [`WorkspaceAction::Clear`].
    pub key: String,
    /// Snapshot of the value written (or removed, for deletes).
    pub value: Option<Value>,
    pub actor: AgentId,
    pub timestamp: DateTime<Utc>,
}

/// Point-in-time copy of a workspace's contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceSnapshot {
    pub id: WorkspaceId,
    pub name: String,
    pub participants: BTreeSet<AgentId>,
    pub data: BTreeMap<String, Value>,
    pub locks: BTreeMap<String, AgentId>,
    pub history_len: usize,
}

/// Key/value store scoped to one collaboration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    id: WorkspaceId,
    name: String,
    participants: BTreeSet<AgentId>,
    data: BTreeMap<String, Value>,
    locks: BTreeMap<String, AgentId>,
    history: Vec<HistoryEntry>,
    created_at: DateTime<Utc>,
}

impl Workspace {
    pub fn new(name: impl Into<String>, participants: impl IntoIterator<Item = AgentId>) -> Self {
        Self {
            id: WorkspaceId::generate(),
            name: name.into(),
            participants: participants.into_iter().collect(),
            data: BTreeMap::new(),
            locks: BTreeMap::new(),
            history: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &WorkspaceId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn audit(&mut self, action: WorkspaceAction, key: &str, value: Option<Value>, actor: &AgentId) {
        self.history.push(HistoryEntry {
            action,
            key: key.to_string(),
            value,
            actor: actor.clone(),
            timestamp: Utc::now(),
        });
    }

    // ==================== Data ====================

    /// Write `value` under `key`, returning the previous value.
    pub fn put(&mut self, key: impl Into<String>, value: Value, actor: &AgentId) -> Option<Value> {
        let key = key.into();
        self.audit(WorkspaceAction::Put, &key, Some(value.clone()), actor);
        self.data.insert(key, value)
    }

    /// Replace the value of an existing key, returning the previous value.
    pub fn update(&mut self, key: &str, value: Value, actor: &AgentId) -> Result<Value, DomainError> {
        let Some(slot) = self.data.get_mut(key) else {
            return Err(DomainError::MissingKey(key.to_string()));
        };
        let previous = std::mem::replace(slot, value.clone());
        self.audit(WorkspaceAction::Update, key, Some(value), actor);
        Ok(previous)
    }

    /// Remove `key`. Only an actual removal is audited.
    pub fn delete(&mut self, key: &str, actor: &AgentId) -> Option<Value> {
        let removed = self.data.remove(key)?;
        self.audit(WorkspaceAction::Delete, key, Some(removed.clone()), actor);
        Some(removed)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Empty data and locks. History is kept, with a `clear` entry appended.
    pub fn clear(&mut self, actor: &AgentId) {
        self.data.clear();
        self.locks.clear();
        self.audit(WorkspaceAction::Clear, "", None, actor);
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    // ==================== Locks ====================

    /// Take the lock on `resource`. Succeeds when it is free or already held
    /// by `actor`.
    pub fn acquire_lock(&mut self, resource: impl Into<String>, actor: &AgentId) -> bool {
        let resource = resource.into();
        match self.locks.get(&resource) {
            Some(holder) => holder == actor,
            None => {
                self.locks.insert(resource, actor.clone());
                true
            }
        }
    }

    /// Release the lock on `resource`. Only the current holder may release.
    pub fn release_lock(&mut self, resource: &str, actor: &AgentId) -> bool {
        if self.locks.get(resource) == Some(actor) {
            self.locks.remove(resource);
            true
        } else {
            false
        }
    }

    pub fn lock_holder(&self, resource: &str) -> Option<&AgentId> {
        self.locks.get(resource)
    }

    /// Resources currently locked by `actor`.
    pub fn locks_held_by(&self, actor: &AgentId) -> Vec<String> {
        self.locks
            .iter()
            .filter(|(_, holder)| *holder == actor)
            .map(|(resource, _)| resource.clone())
            .collect()
    }

    // ==================== Participants ====================

    pub fn participants(&self) -> &BTreeSet<AgentId> {
        &self.participants
    }

    pub fn is_participant(&self, actor: &AgentId) -> bool {
        self.participants.contains(actor)
    }

    /// Returns false when `actor` was already a participant.
    pub fn add_participant(&mut self, actor: AgentId) -> bool {
        self.participants.insert(actor)
    }

    /// Remove `actor` and release every lock it held.
    ///
    /// Returns the released resources.
    pub fn remove_participant(&mut self, actor: &AgentId) -> Vec<String> {
        self.participants.remove(actor);
        let released = self.locks_held_by(actor);
        for resource in &released {
            self.locks.remove(resource);
        }
        released
    }

    pub fn snapshot(&self) -> WorkspaceSnapshot {
        WorkspaceSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            participants: self.participants.clone(),
            data: self.data.clone(),
            locks: self.locks.clone(),
            history_len: self.history.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(s: &str) -> AgentId {
        AgentId::new(s)
    }

    fn workspace() -> Workspace {
        Workspace::new("draft", [id("x"), id("y")])
    }

    #[test]
    fn test_mutations_are_audited() {
        let mut ws = workspace();
        assert_eq!(ws.put("title", json!("v1"), &id("x")), None);
        assert_eq!(ws.update("title", json!("v2"), &id("y")).unwrap(), json!("v1"));
        assert_eq!(ws.get("title"), Some(&json!("v2")));
        assert_eq!(ws.delete("title", &id("x")), Some(json!("v2")));

        let actions: Vec<_> = ws.history().iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![WorkspaceAction::Put, WorkspaceAction::Update, WorkspaceAction::Delete]
        );
        assert_eq!(ws.history()[1].actor, id("y"));
        assert_eq!(ws.history()[2].value, Some(json!("v2")));
    }

    #[test]
    fn test_get_and_missing_delete_are_not_audited() {
        let mut ws = workspace();
        ws.put("k", json!(1), &id("x"));
        let _ = ws.get("k");
        assert_eq!(ws.delete("missing", &id("x")), None);
        assert_eq!(ws.history().len(), 1);
    }

    #[test]
    fn test_update_missing_key_fails() {
        let mut ws = workspace();
        let err = ws.update("nope", json!(1), &id("x")).unwrap_err();
        assert_eq!(err, DomainError::MissingKey("nope".to_string()));
        assert!(ws.history().is_empty());
    }

    #[test]
    fn test_lock_exclusion_and_release() {
        let mut ws = workspace();
        assert!(ws.acquire_lock("f", &id("x")));
        assert!(!ws.acquire_lock("f", &id("y")));
        assert!(ws.acquire_lock("f", &id("x")), "re-acquire is idempotent");
        assert!(!ws.release_lock("f", &id("y")), "only the holder releases");
        assert!(ws.release_lock("f", &id("x")));
        assert!(ws.acquire_lock("f", &id("y")));
        assert_eq!(ws.lock_holder("f"), Some(&id("y")));
    }

    #[test]
    fn test_lock_interleaving_keeps_single_holder() {
        let mut ws = workspace();
        let actors = [id("a"), id("b"), id("c")];
        let mut holder: Option<AgentId> = None;

        for step in 0..60 {
            let actor = &actors[(step * 7 + step / 3) % actors.len()];
            if step % 2 == 0 {
                let acquired = ws.acquire_lock("r", actor);
                assert_eq!(acquired, holder.is_none() || holder.as_ref() == Some(actor));
                if acquired {
                    holder = Some(actor.clone());
                }
            } else {
                let released = ws.release_lock("r", actor);
                assert_eq!(released, holder.as_ref() == Some(actor));
                if released {
                    holder = None;
                }
            }
            assert_eq!(ws.lock_holder("r"), holder.as_ref());
        }
    }

    #[test]
    fn test_remove_participant_releases_exactly_its_locks() {
        let mut ws = workspace();
        ws.acquire_lock("a", &id("x"));
        ws.acquire_lock("b", &id("x"));
        ws.acquire_lock("c", &id("y"));

        let mut released = ws.remove_participant(&id("x"));
        released.sort();
        assert_eq!(released, vec!["a".to_string(), "b".to_string()]);
        assert!(!ws.is_participant(&id("x")));
        assert_eq!(ws.lock_holder("a"), None);
        assert_eq!(ws.lock_holder("c"), Some(&id("y")));
    }

    #[test]
    fn test_clear_keeps_history() {
        let mut ws = workspace();
        ws.put("k", json!(1), &id("x"));
        ws.acquire_lock("k", &id("x"));
        ws.clear(&id("y"));

        assert!(ws.is_empty());
        assert_eq!(ws.lock_holder("k"), None);
        assert_eq!(ws.history().len(), 2);
        assert_eq!(ws.history()[1].action, WorkspaceAction::Clear);
    }

    #[test]
    fn test_snapshot() {
        let mut ws = workspace();
        ws.put("k", json!({"n": 1}), &id("x"));
        ws.acquire_lock("k", &id("x"));
        assert!(ws.add_participant(id("z")));
        assert!(!ws.add_participant(id("z")));

        let snapshot = ws.snapshot();
        assert_eq!(snapshot.name, "draft");
        assert_eq!(snapshot.participants.len(), 3);
        assert_eq!(snapshot.data["k"], json!({"n": 1}));
        assert_eq!(snapshot.locks["k"], id("x"));
        assert_eq!(snapshot.history_len, 1);
    }
}
