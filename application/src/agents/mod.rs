//! Built-in agents.

pub mod scripted;

pub use scripted::{Recorder, ScriptedAgent};
