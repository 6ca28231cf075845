//! Domain entities for the conversation channel.

pub mod message;

pub use message::{
    ConversationScope, ConversationView, Message, MessageId, SenderKind, UnknownSenderKind,
};
