//! In-process backend implementing every collaborator.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::{HistoryReader, InsertCallback, LiveTransport, MessageWriter, TransportHandle};
use crate::entities::{ConversationScope, Message, SenderKind};
use crate::types::{CollaboratorError, CollaboratorResult};

struct Listener {
    scope: ConversationScope,
    on_insert: InsertCallback,
}

#[derive(Default)]
struct BackendState {
    messages: Vec<Message>,
    listeners: HashMap<u64, Listener>,
    next_handle: u64,
    fail_next_read: Option<String>,
    fail_next_write: Option<String>,
}

/// Shared in-memory message table with a live insert feed.
///
/// Every stored message, whether written through [`MessageWriter`] or
/// injected with [`InMemoryBackend::push`], is fanned out to the listeners
/// registered for its scope.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<BackendState>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed stored history without notifying listeners
    pub fn seed(&self, messages: impl IntoIterator<Item = Message>) {
        self.state.lock().messages.extend(messages);
    }

    /// Store a remote message (e.g. an assistant reply) and fan it out
    pub fn push(&self, message: Message) {
        self.state.lock().messages.push(message.clone());
        self.notify(message);
    }

    /// Deliver an insertion event without storing it
    pub fn emit(&self, message: Message) {
        self.notify(message);
    }

    pub fn fail_next_read(&self, reason: impl Into<String>) {
        self.state.lock().fail_next_read = Some(reason.into());
    }

    pub fn fail_next_write(&self, reason: impl Into<String>) {
        self.state.lock().fail_next_write = Some(reason.into());
    }

    pub fn stored(&self, scope: &ConversationScope) -> Vec<Message> {
        self.state
            .lock()
            .messages
            .iter()
            .filter(|message| &message.scope == scope)
            .cloned()
            .collect()
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    fn notify(&self, message: Message) {
        // Callbacks run outside the lock so they may call back into the backend.
        let callbacks: Vec<InsertCallback> = self
            .state
            .lock()
            .listeners
            .values()
            .filter(|listener| listener.scope == message.scope)
            .map(|listener| listener.on_insert.clone())
            .collect();

        for callback in callbacks {
            callback(message.clone());
        }
    }
}

#[async_trait]
impl HistoryReader for InMemoryBackend {
    async fn list_messages(&self, scope: &ConversationScope) -> CollaboratorResult<Vec<Message>> {
        if let Some(reason) = self.state.lock().fail_next_read.take() {
            return Err(CollaboratorError::unavailable(reason));
        }

        let mut messages = self.stored(scope);
        messages.sort_by(Message::display_order);
        Ok(messages)
    }
}

impl LiveTransport for InMemoryBackend {
    fn on(
        &self,
        scope: &ConversationScope,
        on_insert: InsertCallback,
    ) -> CollaboratorResult<TransportHandle> {
        let mut state = self.state.lock();
        state.next_handle += 1;
        let raw = state.next_handle;
        state.listeners.insert(
            raw,
            Listener {
                scope: scope.clone(),
                on_insert,
            },
        );
        debug!(handle = raw, %scope, "registered in-memory listener");
        Ok(TransportHandle::new(raw))
    }

    fn close(&self, handle: TransportHandle) {
        if self.state.lock().listeners.remove(&handle.raw()).is_some() {
            debug!(handle = handle.raw(), "removed in-memory listener");
        }
    }
}

#[async_trait]
impl MessageWriter for InMemoryBackend {
    async fn insert(
        &self,
        scope: &ConversationScope,
        content: &str,
        sender: SenderKind,
    ) -> CollaboratorResult<Message> {
        if let Some(reason) = self.state.lock().fail_next_write.take() {
            return Err(CollaboratorError::rejected(reason));
        }

        let message = Message::new(scope.clone(), content, sender);
        self.push(message.clone());
        Ok(message)
    }
}
