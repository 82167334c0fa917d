//! Task domain
//!
//! - [`entities`] - `Task`, `TaskId`, `TaskStatus`
//! - [`decomposition`] - `decompose`
//! - [`schedule`] - `DependencyScheduler`

pub mod decomposition;
pub mod entities;
pub mod schedule;

pub use decomposition::decompose;
pub use entities::{Task, TaskId, TaskStatus};
pub use schedule::DependencyScheduler;
