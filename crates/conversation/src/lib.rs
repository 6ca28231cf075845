//! # Parley Conversation Crate
//!
//! Real-time conversation channel between a viewer and the assistant. It
//! merges a one-shot history read with a live insertion feed into a single
//! ordered view and applies admission control to outgoing messages.
//!
//! ## Architecture
//!
//! - **Entities**: Message, scope and view types
//! - **Services**: MessageStore, AdmissionGuard, ChannelSubscription, ConversationService
//! - **Repositories**: Collaborator traits for history, live feed and writes, plus an in-memory backend
//! - **Types**: Error types
//! - **Utils**: Internal utilities
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use parley_config::ConversationConfig;
//! use parley_conversation::{Collaborators, ConversationService, InMemoryBackend};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let backend = Arc::new(InMemoryBackend::new());
//! let service = ConversationService::new(
//!     &ConversationConfig::default(),
//!     Collaborators::from_backend(backend),
//! );
//!
//! service.fetch_history().await;
//! let _subscription = service.subscribe();
//! service.send("hello").await.unwrap();
//! assert_eq!(service.view().len(), 1);
//! # }
//! ```

pub mod entities;
pub mod repositories;
pub mod services;
pub mod types;
pub mod utils;

// Re-export main types for convenience
pub use entities::{ConversationScope, ConversationView, Message, MessageId, SenderKind};
pub use repositories::{
    Collaborators, HistoryReader, InMemoryBackend, InsertCallback, LiveTransport, MessageWriter,
    TransportHandle,
};
pub use services::{
    AdmissionDecision, AdmissionGuard, ChannelSubscription, ConversationService, MessageStore,
};
pub use types::{CollaboratorError, CollaboratorResult, SendError, SendResult};
