//! Conversation collection persisted through a [`KeyValueStore`].
//!
//! The whole collection lives under one key as a JSON array, newest first.
//! Every mutating call writes through immediately. Unreadable data is treated
//! as an empty collection.

use crate::session::MessagesChanged;
use crate::storage::KeyValueStore;
use crate::types::{ChatMessage, Conversation, Role, generate_id};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use time::OffsetDateTime;

pub const STORAGE_KEY: &str = "gunadarma-conversations";
pub const DEFAULT_TITLE: &str = "New Conversation";
const TITLE_LIMIT: usize = 32;

pub struct ConversationStore<S> {
    backend: S,
    conversations: Vec<Conversation>,
    active_id: Option<String>,
}

impl<S: KeyValueStore> ConversationStore<S> {
    /// Open the store and hydrate it from the backend.
    pub fn open(backend: S) -> Self {
        let conversations = read_collection(&backend);
        tracing::info!(count = conversations.len(), "loaded conversations");
        Self {
            backend,
            conversations,
            active_id: None,
        }
    }

    /// Read the persisted collection without touching the in-memory copy.
    pub fn load(&self) -> Vec<Conversation> {
        read_collection(&self.backend)
    }

    /// Replace the in-memory collection with what the backend holds now.
    pub fn reload(&mut self) {
        self.conversations = read_collection(&self.backend);
        if let Some(id) = &self.active_id
            && !self.conversations.iter().any(|c| &c.id == id)
        {
            self.active_id = None;
        }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        self.active_id.as_deref().and_then(|id| self.get(id))
    }

    /// Select the active conversation. Unknown ids leave the selection unchanged.
    pub fn set_active(&mut self, id: Option<&str>) -> bool {
        match id {
            Some(id) if self.get(id).is_none() => false,
            _ => {
                self.active_id = id.map(str::to_string);
                true
            }
        }
    }

    pub fn create_conversation(&mut self, title: Option<&str>) -> Conversation {
        let now = OffsetDateTime::now_utc();
        let conversation = Conversation {
            id: generate_id(),
            title: title.unwrap_or(DEFAULT_TITLE).to_string(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            title_locked: title.is_some(),
        };

        self.conversations.insert(0, conversation.clone());
        self.active_id = Some(conversation.id.clone());
        self.persist();
        tracing::debug!(id = %conversation.id, "created conversation");
        conversation
    }

    /// Replace the messages of `id`, deriving a title if it had none before
    /// and the title was never set explicitly.
    pub fn update_messages(&mut self, id: &str, messages: Vec<ChatMessage>) {
        let Some(conversation) = self.conversations.iter_mut().find(|c| c.id == id) else {
            tracing::debug!(id, "update for unknown conversation ignored");
            return;
        };

        if conversation.messages.is_empty()
            && !conversation.title_locked
            && let Some(title) = derive_title(&messages)
        {
            conversation.title = title;
        }
        conversation.messages = messages;
        touch(conversation);
        self.persist();
    }

    pub fn rename(&mut self, id: &str, title: &str) {
        let Some(conversation) = self.conversations.iter_mut().find(|c| c.id == id) else {
            return;
        };
        conversation.title = title.to_string();
        conversation.title_locked = true;
        touch(conversation);
        self.persist();
    }

    pub fn delete(&mut self, id: &str) {
        self.conversations.retain(|c| c.id != id);
        if self.active_id.as_deref() == Some(id) {
            self.active_id = None;
        }
        self.persist();
    }

    /// Drop every conversation and erase the persisted key.
    pub fn reset_all(&mut self) {
        self.conversations.clear();
        self.active_id = None;
        if let Err(err) = self.backend.remove(STORAGE_KEY) {
            tracing::warn!("failed to clear persisted conversations: {}", err);
        }
        tracing::info!("conversation history reset");
    }

    fn persist(&self) {
        let serialized = match serde_json::to_string(&self.conversations) {
            Ok(serialized) => serialized,
            Err(err) => {
                tracing::warn!("failed to serialize conversations: {}", err);
                return;
            }
        };
        if let Err(err) = self.backend.set(STORAGE_KEY, &serialized) {
            tracing::warn!("failed to persist conversations: {}", err);
        }
    }
}

/// Build the hook a [`ChatSession`](crate::session::ChatSession) uses to keep this store current.
pub fn sync_callback<S>(store: Arc<Mutex<ConversationStore<S>>>) -> MessagesChanged
where
    S: KeyValueStore + 'static,
{
    Arc::new(move |conversation_id: Option<&str>, messages: &[ChatMessage]| {
        let Some(id) = conversation_id else {
            return;
        };
        store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .update_messages(id, messages.to_vec());
    })
}

/// Title from the first user message: at most 32 characters, "..." when cut.
pub fn derive_title(messages: &[ChatMessage]) -> Option<String> {
    let first = messages.iter().find(|m| m.role == Role::User)?;
    let trimmed = first.content.trim();
    if trimmed.is_empty() {
        return None;
    }

    let snippet: String = trimmed.chars().take(TITLE_LIMIT).collect();
    let snippet = snippet.trim_end();
    if snippet.is_empty() {
        return None;
    }

    if trimmed.chars().count() > TITLE_LIMIT {
        Some(format!("{snippet}..."))
    } else {
        Some(snippet.to_string())
    }
}

fn touch(conversation: &mut Conversation) {
    conversation.updated_at = OffsetDateTime::now_utc().max(conversation.created_at);
}

fn read_collection<S: KeyValueStore>(backend: &S) -> Vec<Conversation> {
    let Some(raw) = backend.get(STORAGE_KEY) else {
        return Vec::new();
    };

    match serde_json::from_str::<Vec<Conversation>>(&raw) {
        Ok(conversations) => {
            let mut seen = HashSet::new();
            conversations
                .into_iter()
                .filter(|c| seen.insert(c.id.clone()))
                .collect()
        }
        Err(err) => {
            tracing::warn!("Failed to load conversations from storage: {}", err);
            Vec::new()
        }
    }
}
