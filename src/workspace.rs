use crate::ai::QuestionBackend;
use crate::conversations::{ConversationStore, sync_callback};
use crate::session::{ChatSession, SessionOptions};
use crate::storage::KeyValueStore;
use crate::types::{Conversation, SendOptions};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Binds the conversation store to a chat session the way the chat surface does:
/// the session follows the store's active conversation and every change to its
/// working list is written back through the store.
pub struct ChatWorkspace<S> {
    store: Arc<Mutex<ConversationStore<S>>>,
    session: ChatSession,
}

impl<S: KeyValueStore + 'static> ChatWorkspace<S> {
    pub fn new(backend: Arc<dyn QuestionBackend>, store: ConversationStore<S>) -> Self {
        let store = Arc::new(Mutex::new(store));
        let session = ChatSession::new(
            backend,
            SessionOptions {
                on_messages_change: Some(sync_callback(Arc::clone(&store))),
                ..SessionOptions::default()
            },
        );
        Self { store, session }
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// Lock the store for reading or direct edits.
    pub fn store(&self) -> MutexGuard<'_, ConversationStore<S>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.store().conversations().to_vec()
    }

    pub fn active_conversation(&self) -> Option<Conversation> {
        self.store().active_conversation().cloned()
    }

    pub fn start_new_conversation(&self, title: Option<&str>) -> Conversation {
        let conversation = self.store().create_conversation(title);
        self.session
            .set_conversation(Some(conversation.id.clone()), Vec::new());
        conversation
    }

    /// Make `id` active and load its persisted messages into the session.
    pub fn select_conversation(&self, id: &str) -> bool {
        let messages = {
            let mut store = self.store();
            if !store.set_active(Some(id)) {
                return false;
            }
            store
                .get(id)
                .map(|c| c.messages.clone())
                .unwrap_or_default()
        };
        self.session.set_conversation(Some(id.to_string()), messages);
        true
    }

    /// Send into the active conversation, creating one first when none is active.
    pub fn send(&self, text: &str, options: SendOptions) {
        if text.trim().is_empty() {
            return;
        }
        let active = self.store().active_id().map(str::to_string);
        if active.is_none() {
            self.start_new_conversation(None);
        }
        self.session.send_message(text, options);
    }

    pub fn rename_conversation(&self, id: &str, title: &str) {
        self.store().rename(id, title);
    }

    pub fn delete_conversation(&self, id: &str) {
        let was_active = {
            let mut store = self.store();
            let was_active = store.active_id() == Some(id);
            store.delete(id);
            was_active
        };
        if was_active {
            self.session.set_conversation(None, Vec::new());
        }
    }

    /// Cancel outstanding work, clear the session and wipe persisted history.
    pub fn reset_all(&self) {
        self.session.cancel_pending_request();
        self.session.set_conversation(None, Vec::new());
        self.session.reset_conversation();
        self.store().reset_all();
    }
}
