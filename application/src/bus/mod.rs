//! Message bus
//!
//! Per-agent bounded inboxes and the communication graph.

pub mod message_bus;

pub use message_bus::{BusError, MessageBus};
