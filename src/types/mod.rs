//! Request-scoped value types shared across the crate.

pub mod conversation;

pub use conversation::{latest_user_content, ConversationTurn, Role};
