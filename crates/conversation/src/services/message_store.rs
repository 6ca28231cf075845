//! Ordered, deduplicated message list fed by the history fetch and the live feed.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::entities::{ConversationView, Message, MessageId};
use crate::types::CollaboratorError;

const VIEW_UPDATES_CAPACITY: usize = 64;

#[derive(Default)]
struct StoreState {
    messages: Vec<Message>,
    ids: HashSet<MessageId>,
    loaded: bool,
    fetch_error: Option<String>,
    /// Live events received before the first load resolved
    pending: Vec<Message>,
}

impl StoreState {
    fn view(&self) -> ConversationView {
        ConversationView {
            messages: self.messages.clone(),
            loading: !self.loaded,
            fetch_error: self.fetch_error.clone(),
        }
    }

    fn insert_sorted(&mut self, incoming: Message) -> bool {
        if !self.ids.insert(incoming.id.clone()) {
            return false;
        }
        let position = self
            .messages
            .partition_point(|existing| existing.display_order(&incoming).is_lt());
        self.messages.insert(position, incoming);
        true
    }
}

/// Single owner of the conversation's message list.
///
/// Cloning yields another handle onto the same list. Every mutation keeps the
/// list sorted by `(created_at, id)` with unique ids, and membership only
/// grows.
#[derive(Clone)]
pub struct MessageStore {
    state: Arc<Mutex<StoreState>>,
    updates: broadcast::Sender<ConversationView>,
}

impl MessageStore {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(VIEW_UPDATES_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            updates,
        }
    }

    /// Install the initial history.
    ///
    /// Replaces the fetched baseline, then re-applies every live event that
    /// was buffered while the fetch was in flight. Messages already observed
    /// are never dropped.
    pub fn load(&self, initial: Vec<Message>) -> ConversationView {
        self.install(initial, None)
    }

    /// Resolve the initial fetch as failed: present an empty, non-blocking
    /// view and keep the failure as a diagnostic.
    pub fn load_failed(&self, error: &CollaboratorError) -> ConversationView {
        warn!(error = %error, "history fetch failed, presenting empty conversation");
        self.install(Vec::new(), Some(error.to_string()))
    }

    fn install(&self, initial: Vec<Message>, fetch_error: Option<String>) -> ConversationView {
        let mut state = self.state.lock();
        let fetched = initial.len();

        let mut retained = std::mem::take(&mut state.messages);
        retained.extend(initial);
        let pending = std::mem::take(&mut state.pending);
        let buffered = pending.len();
        retained.extend(pending);

        state.ids.clear();
        for message in retained {
            if state.ids.insert(message.id.clone()) {
                state.messages.push(message);
            }
        }
        state.messages.sort_by(Message::display_order);
        state.loaded = true;
        state.fetch_error = fetch_error;

        info!(
            fetched,
            buffered,
            total = state.messages.len(),
            "conversation history loaded"
        );
        let view = state.view();
        self.publish(&view);
        view
    }

    /// Merge one live event. Idempotent on message id.
    pub fn merge(&self, incoming: Message) -> ConversationView {
        let mut state = self.state.lock();

        if !state.loaded {
            let already_known = state.pending.iter().any(|m| m.id == incoming.id);
            if !already_known {
                debug!(id = %incoming.id, "buffering live message until history loads");
                state.pending.push(incoming);
            }
            return state.view();
        }

        let id = incoming.id.clone();
        let view_changed = state.insert_sorted(incoming);
        let view = state.view();
        if view_changed {
            debug!(%id, "merged live message");
            self.publish(&view);
        }
        view
    }

    pub fn view(&self) -> ConversationView {
        self.state.lock().view()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.lock().loaded
    }

    /// Receive every view published after a visible change
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationView> {
        self.updates.subscribe()
    }

    /// Called with the state lock held so views go out in mutation order.
    fn publish(&self, view: &ConversationView) {
        // No receivers is fine; views are also available on demand.
        let _ = self.updates.send(view.clone());
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}
