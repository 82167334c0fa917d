//! Message domain
//!
//! The envelope every agent interaction travels in. Replies are built with
//! [`Message::reply`] so they always carry their request's conversation id.

pub mod entities;

pub use entities::{ConversationId, Message, MessageKind, MessagePriority};
