//! Public send/receive contract of a conversation.

use parking_lot::Mutex;
use parley_config::ConversationConfig;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{AdmissionGuard, ChannelSubscription, MessageStore};
use crate::entities::{ConversationScope, ConversationView, Message, SenderKind};
use crate::repositories::Collaborators;
use crate::types::{SendError, SendResult};

/// One viewer's conversation: history, live feed and outgoing messages.
pub struct ConversationService {
    scope: ConversationScope,
    store: MessageStore,
    guard: Mutex<AdmissionGuard>,
    collaborators: Collaborators,
}

impl ConversationService {
    pub fn new(config: &ConversationConfig, collaborators: Collaborators) -> Self {
        Self::with_guard(
            ConversationScope::new(config.scope.clone()),
            AdmissionGuard::from_config(config),
            collaborators,
        )
    }

    pub fn with_guard(
        scope: ConversationScope,
        guard: AdmissionGuard,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            scope,
            store: MessageStore::new(),
            guard: Mutex::new(guard),
            collaborators,
        }
    }

    /// Read the stored history once and install it.
    ///
    /// A failed read never surfaces as an error: the view resolves empty
    /// and carries the failure in `fetch_error`.
    pub async fn fetch_history(&self) -> ConversationView {
        debug!(scope = %self.scope, "fetching conversation history");
        match self.collaborators.history.list_messages(&self.scope).await {
            Ok(messages) => self.store.load(messages),
            Err(error) => self.store.load_failed(&error),
        }
    }

    /// Route live insertions for this conversation into the store.
    /// Dropping or closing the returned subscription stops delivery.
    pub fn subscribe(&self) -> ChannelSubscription {
        let store = self.store.clone();
        ChannelSubscription::open(
            self.collaborators.transport.clone(),
            self.scope.clone(),
            move |message| {
                store.merge(message);
            },
        )
    }

    /// Admit and store a viewer message.
    ///
    /// The stored message reaches the view through the live feed. An
    /// admitted message whose write fails still counts against the rate
    /// limit.
    pub async fn send(&self, content: &str) -> SendResult<Message> {
        let accepted = self
            .guard
            .lock()
            .try_accept(content, Instant::now())
            .into_result();

        let content = match accepted {
            Ok(content) => content,
            Err(rejection) => {
                debug!(scope = %self.scope, reason = %rejection, "send rejected");
                return Err(rejection);
            }
        };

        match self
            .collaborators
            .writer
            .insert(&self.scope, &content, SenderKind::Viewer)
            .await
        {
            Ok(message) => {
                info!(scope = %self.scope, id = %message.id, "message stored");
                Ok(message)
            }
            Err(error) => {
                warn!(scope = %self.scope, error = %error, "failed to store message");
                Err(SendError::WriteFailed(error))
            }
        }
    }

    pub fn view(&self) -> ConversationView {
        self.store.view()
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn scope(&self) -> &ConversationScope {
        &self.scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::repositories::InMemoryBackend;
    use crate::types::CollaboratorError;

    fn service(backend: &Arc<InMemoryBackend>) -> ConversationService {
        ConversationService::new(
            &ConversationConfig {
                scope: "alice".into(),
                ..ConversationConfig::default()
            },
            Collaborators::from_backend(backend.clone()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn accepted_send_is_stored_and_echoed_into_the_view() {
        let backend = Arc::new(InMemoryBackend::new());
        let service = service(&backend);
        service.fetch_history().await;
        let _subscription = service.subscribe();

        let stored = service.send("  hello  ").await.unwrap();

        assert_eq!(stored.content, "hello");
        assert_eq!(stored.sender, SenderKind::Viewer);
        assert_eq!(service.view().messages, vec![stored]);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_sends_never_reach_the_writer() {
        let backend = Arc::new(InMemoryBackend::new());
        let service = service(&backend);

        assert_eq!(service.send("   ").await, Err(SendError::Empty));
        assert!(matches!(
            service.send(&"x".repeat(2001)).await,
            Err(SendError::TooLong { length: 2001, max: 2000 })
        ));

        service.send("first").await.unwrap();
        assert!(matches!(
            service.send("second").await,
            Err(SendError::RateLimited { .. })
        ));

        assert_eq!(backend.stored(service.scope()).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_write_spends_the_rate_limit_slot() {
        let backend = Arc::new(InMemoryBackend::new());
        let service = service(&backend);

        backend.fail_next_write("quota exceeded");
        assert_eq!(
            service.send("hello").await,
            Err(SendError::WriteFailed(CollaboratorError::rejected(
                "quota exceeded"
            )))
        );
        assert!(matches!(
            service.send("hello again").await,
            Err(SendError::RateLimited { .. })
        ));

        tokio::time::advance(Duration::from_millis(1000)).await;
        assert!(service.send("hello again").await.is_ok());
    }

    #[tokio::test]
    async fn failed_history_resolves_to_an_empty_view() {
        let backend = Arc::new(InMemoryBackend::new());
        let service = service(&backend);

        backend.fail_next_read("timeout");
        let view = service.fetch_history().await;

        assert!(!view.loading);
        assert!(view.is_empty());
        assert!(view.fetch_error.is_some());
    }
}
