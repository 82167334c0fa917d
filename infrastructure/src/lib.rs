//! Infrastructure layer for concord
//!
//! Configuration file loading, `tracing` setup and the JSONL collaboration
//! transcript that implements the application's logger port.

pub mod config;
pub mod logging;

// Re-export commonly used types
pub use config::{ConfigLoader, ConfigValidationError, FileConfig};
pub use logging::{
    JsonlCollaborationLogger, LoggingError, LoggingSettings, init_tracing,
};
