//! In-process live insertion feed backed by a broadcast channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use parley_conversation::{
    CollaboratorError, CollaboratorResult, ConversationScope, InsertCallback, LiveTransport,
    Message, TransportHandle,
};
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const FEED_CAPACITY: usize = 100;

struct Inner {
    sender: broadcast::Sender<Message>,
    forwarders: Mutex<HashMap<u64, JoinHandle<()>>>,
    next_handle: AtomicU64,
}

/// Fans stored messages out to every registered listener of their scope.
///
/// Each registration gets its own forwarding task; closing the handle aborts
/// it. A listener that falls behind skips the missed events.
#[derive(Clone)]
pub struct BroadcastTransport {
    inner: Arc<Inner>,
}

impl BroadcastTransport {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                sender,
                forwarders: Mutex::new(HashMap::new()),
                next_handle: AtomicU64::new(1),
            }),
        }
    }

    /// Announce a stored message. Returns the number of live listeners reached.
    pub fn publish(&self, message: Message) -> usize {
        self.inner.sender.send(message).unwrap_or(0)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.forwarders.lock().len()
    }
}

impl Default for BroadcastTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveTransport for BroadcastTransport {
    fn on(
        &self,
        scope: &ConversationScope,
        on_insert: InsertCallback,
    ) -> CollaboratorResult<TransportHandle> {
        let runtime = Handle::try_current()
            .map_err(|e| CollaboratorError::unavailable(format!("no async runtime: {e}")))?;

        let raw = self.inner.next_handle.fetch_add(1, Ordering::Relaxed);
        let mut receiver = self.inner.sender.subscribe();
        let scope = scope.clone();

        let forwarder = runtime.spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(message) if message.scope == scope => on_insert(message),
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(handle = raw, skipped, "live listener lagged, events skipped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!(handle = raw, "live feed closed");
        });

        self.inner.forwarders.lock().insert(raw, forwarder);
        Ok(TransportHandle::new(raw))
    }

    fn close(&self, handle: TransportHandle) {
        if let Some(forwarder) = self.inner.forwarders.lock().remove(&handle.raw()) {
            forwarder.abort();
        }
    }
}
