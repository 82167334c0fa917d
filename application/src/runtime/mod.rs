//! Agent runtime: one message loop per registered agent.

pub mod agent_runtime;

pub use agent_runtime::{AgentHandle, AgentRuntime};
