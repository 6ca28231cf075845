//! Boundaries to the external data service.
//!
//! The conversation core never talks to storage directly. It reads history,
//! listens for live inserts and writes new messages through these three
//! collaborators, which a backend (SQLite, in-memory, hosted service)
//! implements.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::entities::{ConversationScope, Message, SenderKind};
use crate::types::CollaboratorResult;

pub use memory::InMemoryBackend;

/// Callback invoked for every remote insertion event
pub type InsertCallback = Arc<dyn Fn(Message) + Send + Sync>;

/// Token identifying one live registration on a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportHandle(u64);

impl TransportHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// One-shot read of a conversation's stored messages
#[async_trait]
pub trait HistoryReader: Send + Sync {
    async fn list_messages(&self, scope: &ConversationScope) -> CollaboratorResult<Vec<Message>>;
}

/// Push feed of insertion events.
///
/// Registration does not suspend. A transport may stop delivering after a
/// disconnect and may even deliver after `close`; callers guard against both.
pub trait LiveTransport: Send + Sync {
    fn on(
        &self,
        scope: &ConversationScope,
        on_insert: InsertCallback,
    ) -> CollaboratorResult<TransportHandle>;

    fn close(&self, handle: TransportHandle);
}

/// Persists a new message and returns it as stored
#[async_trait]
pub trait MessageWriter: Send + Sync {
    async fn insert(
        &self,
        scope: &ConversationScope,
        content: &str,
        sender: SenderKind,
    ) -> CollaboratorResult<Message>;
}

/// The three collaborators a conversation is wired to
#[derive(Clone)]
pub struct Collaborators {
    pub history: Arc<dyn HistoryReader>,
    pub transport: Arc<dyn LiveTransport>,
    pub writer: Arc<dyn MessageWriter>,
}

impl Collaborators {
    pub fn new(
        history: Arc<dyn HistoryReader>,
        transport: Arc<dyn LiveTransport>,
        writer: Arc<dyn MessageWriter>,
    ) -> Self {
        Self {
            history,
            transport,
            writer,
        }
    }

    /// Use one backend for all three roles
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: HistoryReader + LiveTransport + MessageWriter + 'static,
    {
        Self {
            history: backend.clone(),
            transport: backend.clone(),
            writer: backend,
        }
    }
}
