//! Thread-safe handle to a [`Workspace`].
//!
//! Every operation takes the one workspace-wide mutex, so mutations are
//! serialized and lock checks cannot interleave. Callers only ever see
//! clones and snapshots, never the underlying map.

use crate::sync::lock;
use concord_domain::{
    AgentId, DomainError, HistoryEntry, Workspace, WorkspaceId, WorkspaceSnapshot,
};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Mutex;
use tracing::debug;

pub struct SharedWorkspace {
    id: WorkspaceId,
    name: String,
    inner: Mutex<Workspace>,
}

impl SharedWorkspace {
    pub fn new(name: impl Into<String>, participants: impl IntoIterator<Item = AgentId>) -> Self {
        Self::from_workspace(Workspace::new(name, participants))
    }

    pub fn from_workspace(workspace: Workspace) -> Self {
        Self {
            id: workspace.id().clone(),
            name: workspace.name().to_string(),
            inner: Mutex::new(workspace),
        }
    }

    pub fn id(&self) -> &WorkspaceId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ==================== Data ====================

    pub fn put(&self, key: impl Into<String>, value: Value, actor: &AgentId) -> Option<Value> {
        lock(&self.inner).put(key, value, actor)
    }

    pub fn update(&self, key: &str, value: Value, actor: &AgentId) -> Result<Value, DomainError> {
        lock(&self.inner).update(key, value, actor)
    }

    pub fn delete(&self, key: &str, actor: &AgentId) -> Option<Value> {
        lock(&self.inner).delete(key, actor)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        lock(&self.inner).get(key).cloned()
    }

    /// Write `key` on behalf of the holder of the lock on `key`.
    pub fn put_locked(&self, key: &str, value: Value, actor: &AgentId) -> Result<Option<Value>, DomainError> {
        let mut workspace = lock(&self.inner);
        if workspace.lock_holder(key) != Some(actor) {
            return Err(DomainError::NotLockHolder {
                resource: key.to_string(),
                actor: actor.to_string(),
            });
        }
        Ok(workspace.put(key, value, actor))
    }

    /// Empty data and locks; history survives.
    pub fn clear(&self, actor: &AgentId) {
        lock(&self.inner).clear(actor);
        debug!(workspace = %self.id, actor = %actor, "Workspace cleared");
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        lock(&self.inner).history().to_vec()
    }

    pub fn snapshot(&self) -> WorkspaceSnapshot {
        lock(&self.inner).snapshot()
    }

    // ==================== Locks ====================

    pub fn acquire_lock(&self, resource: impl Into<String>, actor: &AgentId) -> bool {
        lock(&self.inner).acquire_lock(resource, actor)
    }

    pub fn release_lock(&self, resource: &str, actor: &AgentId) -> bool {
        lock(&self.inner).release_lock(resource, actor)
    }

    pub fn lock_holder(&self, resource: &str) -> Option<AgentId> {
        lock(&self.inner).lock_holder(resource).cloned()
    }

    // ==================== Participants ====================

    pub fn participants(&self) -> BTreeSet<AgentId> {
        lock(&self.inner).participants().clone()
    }

    pub fn add_participant(&self, actor: AgentId) -> bool {
        lock(&self.inner).add_participant(actor)
    }

    /// Remove `actor`, releasing its locks. Returns the released resources.
    pub fn remove_participant(&self, actor: &AgentId) -> Vec<String> {
        let released = lock(&self.inner).remove_participant(actor);
        if !released.is_empty() {
            debug!(workspace = %self.id, actor = %actor, released = ?released, "Released locks");
        }
        released
    }
}
