pub mod admission;
pub mod conversation;
pub mod message_store;
pub mod subscription;

pub use admission::{AdmissionDecision, AdmissionGuard};
pub use conversation::ConversationService;
pub use message_store::MessageStore;
pub use subscription::ChannelSubscription;
