//! Shared workspace domain

pub mod entities;

pub use entities::{HistoryEntry, Workspace, WorkspaceAction, WorkspaceId, WorkspaceSnapshot};
