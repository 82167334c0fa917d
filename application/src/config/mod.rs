//! Application-level configuration.
//!
//! - [`CollaborationParams`] - queue capacity, timeouts and consensus knobs
//!   shared by the bus, the protocols and the negotiation loop

pub mod collaboration_params;

pub use collaboration_params::{CollaborationParams, DEFAULT_QUEUE_CAPACITY};
