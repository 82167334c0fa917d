//! Agent domain module
//!
//! Agents themselves are external collaborators; the domain only knows their
//! [`AgentProfile`] and how to match profiles against tasks.

pub mod capability;
pub mod selection;
pub mod value_objects;

pub use capability::Capability;
pub use selection::{DEFAULT_FALLBACK_COUNT, best_assignee, leader_score, select_agents, select_leader};
pub use value_objects::{AgentId, AgentProfile};
