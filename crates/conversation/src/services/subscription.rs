//! Lifecycle of one live insertion feed.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::entities::{ConversationScope, Message};
use crate::repositories::{LiveTransport, TransportHandle};

/// Owned handle onto a live feed scoped to one conversation.
///
/// Events are handed to the callback in transport order. Once [`close`] has
/// returned (or the handle has been dropped) the callback is never invoked
/// again, even if the transport delivers late. A delivery already running
/// when `close` is called finishes before `close` returns.
///
/// Closing or dropping the subscription from inside its own callback
/// deadlocks.
///
/// [`close`]: ChannelSubscription::close
pub struct ChannelSubscription {
    transport: Arc<dyn LiveTransport>,
    scope: ConversationScope,
    handle: Mutex<Option<TransportHandle>>,
    /// Held shared for each delivery and exclusively to deactivate
    active: Arc<RwLock<bool>>,
}

impl ChannelSubscription {
    /// Register `on_insert` for every insertion in `scope`.
    ///
    /// Never fails: when the transport refuses the registration the returned
    /// subscription is inert, delivers nothing, and can still be closed.
    pub fn open<F>(transport: Arc<dyn LiveTransport>, scope: ConversationScope, on_insert: F) -> Self
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        let active = Arc::new(RwLock::new(true));

        let guard = active.clone();
        let expected_scope = scope.clone();
        let callback = Arc::new(move |message: Message| {
            let delivering = guard.read();
            if !*delivering {
                warn!(id = %message.id, "dropping event delivered after close");
                return;
            }
            if message.scope != expected_scope {
                warn!(
                    id = %message.id,
                    scope = %message.scope,
                    expected = %expected_scope,
                    "dropping event for another conversation"
                );
                return;
            }
            on_insert(message);
        });

        let handle = match transport.on(&scope, callback) {
            Ok(handle) => {
                info!(%scope, handle = handle.raw(), "live subscription opened");
                Some(handle)
            }
            Err(error) => {
                warn!(%scope, error = %error, "live subscription could not be opened");
                *active.write() = false;
                None
            }
        };

        Self {
            transport,
            scope,
            handle: Mutex::new(handle),
            active,
        }
    }

    /// Stop delivery and release the transport registration. Idempotent.
    ///
    /// Waits for a delivery that is already running to finish.
    pub fn close(&self) {
        *self.active.write() = false;

        if let Some(handle) = self.handle.lock().take() {
            self.transport.close(handle);
            info!(scope = %self.scope, handle = handle.raw(), "live subscription closed");
        }
    }

    /// Whether events are still being delivered
    pub fn is_active(&self) -> bool {
        *self.active.read()
    }

    pub fn scope(&self) -> &ConversationScope {
        &self.scope
    }
}

impl Drop for ChannelSubscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ChannelSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSubscription")
            .field("scope", &self.scope)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    use crate::entities::SenderKind;
    use crate::repositories::{InMemoryBackend, InsertCallback};
    use crate::types::{CollaboratorError, CollaboratorResult};

    fn scope(name: &str) -> ConversationScope {
        ConversationScope::new(name)
    }

    fn collector() -> (Arc<Mutex<Vec<String>>>, impl Fn(Message) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |message: Message| {
            sink.lock().push(message.content);
        })
    }

    /// Keeps every callback it was ever given and ignores `close`.
    #[derive(Default)]
    struct LeakyTransport {
        callbacks: Mutex<Vec<InsertCallback>>,
        closed: Mutex<Vec<TransportHandle>>,
    }

    impl LeakyTransport {
        fn emit(&self, message: Message) {
            let callbacks = self.callbacks.lock().clone();
            for callback in callbacks {
                callback(message.clone());
            }
        }
    }

    impl LiveTransport for LeakyTransport {
        fn on(
            &self,
            _scope: &ConversationScope,
            on_insert: InsertCallback,
        ) -> CollaboratorResult<TransportHandle> {
            let mut callbacks = self.callbacks.lock();
            callbacks.push(on_insert);
            Ok(TransportHandle::new(callbacks.len() as u64))
        }

        fn close(&self, handle: TransportHandle) {
            self.closed.lock().push(handle);
        }
    }

    struct RefusingTransport;

    impl LiveTransport for RefusingTransport {
        fn on(
            &self,
            _scope: &ConversationScope,
            _on_insert: InsertCallback,
        ) -> CollaboratorResult<TransportHandle> {
            Err(CollaboratorError::unavailable("socket closed"))
        }

        fn close(&self, _handle: TransportHandle) {
            panic!("nothing was registered");
        }
    }

    #[test]
    fn delivers_in_transport_order() {
        let backend = Arc::new(InMemoryBackend::new());
        let (seen, on_insert) = collector();
        let subscription = ChannelSubscription::open(backend.clone(), scope("alice"), on_insert);

        backend.emit(Message::new(scope("alice"), "second", SenderKind::Assistant));
        backend.emit(Message::new(scope("alice"), "first", SenderKind::Viewer));

        assert!(subscription.is_active());
        assert_eq!(*seen.lock(), vec!["second", "first"]);
    }

    #[test]
    fn close_is_idempotent_and_releases_the_registration() {
        let backend = Arc::new(InMemoryBackend::new());
        let subscription = ChannelSubscription::open(backend.clone(), scope("alice"), |_| {});
        assert_eq!(backend.listener_count(), 1);

        subscription.close();
        subscription.close();

        assert!(!subscription.is_active());
        assert_eq!(backend.listener_count(), 0);
    }

    #[test]
    fn late_events_after_close_are_dropped() {
        let transport = Arc::new(LeakyTransport::default());
        let (seen, on_insert) = collector();
        let subscription = ChannelSubscription::open(transport.clone(), scope("alice"), on_insert);

        transport.emit(Message::new(scope("alice"), "before", SenderKind::Assistant));
        subscription.close();
        transport.emit(Message::new(scope("alice"), "after", SenderKind::Assistant));

        assert_eq!(*seen.lock(), vec!["before"]);
        assert_eq!(transport.closed.lock().len(), 1);
    }

    #[test]
    fn events_for_other_scopes_are_filtered() {
        let transport = Arc::new(LeakyTransport::default());
        let (seen, on_insert) = collector();
        let _subscription = ChannelSubscription::open(transport.clone(), scope("alice"), on_insert);

        transport.emit(Message::new(scope("bob"), "not mine", SenderKind::Assistant));
        transport.emit(Message::new(scope("alice"), "mine", SenderKind::Assistant));

        assert_eq!(*seen.lock(), vec!["mine"]);
    }

    #[test]
    fn drop_closes_the_subscription() {
        let transport = Arc::new(LeakyTransport::default());
        let (seen, on_insert) = collector();
        {
            let _subscription =
                ChannelSubscription::open(transport.clone(), scope("alice"), on_insert);
        }

        transport.emit(Message::new(scope("alice"), "late", SenderKind::Assistant));
        assert!(seen.lock().is_empty());
        assert_eq!(transport.closed.lock().len(), 1);
    }

    #[test]
    fn failed_open_yields_an_inert_closable_subscription() {
        let subscription = ChannelSubscription::open(Arc::new(RefusingTransport), scope("alice"), |_| {
            panic!("inert subscription must not deliver");
        });

        assert!(!subscription.is_active());
        subscription.close();
        subscription.close();
    }

    #[test]
    fn close_waits_for_a_delivery_in_progress() {
        let transport = Arc::new(LeakyTransport::default());
        let entered = Arc::new(Barrier::new(2));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let subscription = {
            let entered = entered.clone();
            let seen = seen.clone();
            ChannelSubscription::open(transport.clone(), scope("alice"), move |message| {
                entered.wait();
                thread::sleep(Duration::from_millis(200));
                seen.lock().push(message.content);
            })
        };

        let delivery = {
            let transport = transport.clone();
            thread::spawn(move || {
                transport.emit(Message::new(scope("alice"), "in flight", SenderKind::Assistant));
            })
        };

        entered.wait();
        subscription.close();
        let seen_at_close = seen.lock().clone();

        delivery.join().unwrap();
        transport.emit(Message::new(scope("alice"), "late", SenderKind::Assistant));

        assert_eq!(seen_at_close, vec!["in flight"]);
        assert_eq!(*seen.lock(), seen_at_close);
    }
}
