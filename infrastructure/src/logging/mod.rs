//! Logging infrastructure: diagnostics and collaboration transcripts.
//!
//! [`init_tracing`] installs the `tracing` subscriber used for diagnostics.
//! [`JsonlCollaborationLogger`] implements the
//! [`CollaborationLogger`](concord_application::CollaborationLogger) port by
//! appending events to a JSONL file.

mod tracing_setup;
mod transcript;

pub use tracing_setup::{LoggingError, LoggingSettings, init_tracing};
pub use transcript::JsonlCollaborationLogger;
