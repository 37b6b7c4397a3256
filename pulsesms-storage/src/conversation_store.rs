//! Thread-safe map of conversation id to its local projection.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Identifier of a conversation on the mirror service.
pub type ConversationId = i64;

/// Local projection of a remote conversation.
///
/// All text fields hold plaintext; the store never sees ciphertext.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ConversationId,
    pub title: String,
    /// Preview of the latest message.
    pub snippet: String,
    /// Unix timestamp (milliseconds) of the latest message.
    pub timestamp: i64,
    pub read: bool,
    pub archived: bool,
}

/// Shared conversation cache.
#[derive(Clone, Default)]
pub struct ConversationStore {
    chats: Arc<RwLock<HashMap<ConversationId, Chat>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the chat keyed by its id.
    pub async fn upsert(&self, chat: Chat) {
        self.chats.write().await.insert(chat.id, chat);
    }

    /// Inserts or replaces several chats under a single write lock.
    pub async fn upsert_all(&self, chats: impl IntoIterator<Item = Chat>) {
        let mut guard = self.chats.write().await;
        for chat in chats {
            guard.insert(chat.id, chat);
        }
    }

    pub async fn get(&self, id: ConversationId) -> Option<Chat> {
        self.chats.read().await.get(&id).cloned()
    }

    /// Folds a single new message into the conversation's metadata.
    ///
    /// Older activity never overwrites newer activity. A conversation that is
    /// not known yet is created with an empty title. Returns `true` when the
    /// store changed.
    pub async fn record_activity(
        &self,
        id: ConversationId,
        snippet: &str,
        timestamp: i64,
        read: bool,
    ) -> bool {
        let mut guard = self.chats.write().await;
        let chat = guard.entry(id).or_insert_with(|| Chat {
            id,
            ..Chat::default()
        });

        if chat.timestamp > timestamp {
            debug!(
                "ignoring stale activity for conversation {id} ({timestamp} < {})",
                chat.timestamp
            );
            return false;
        }

        chat.snippet = snippet.to_string();
        chat.timestamp = timestamp;
        chat.read = read;
        true
    }

    /// Removes a conversation, returning its last known state.
    pub async fn remove(&self, id: ConversationId) -> Option<Chat> {
        self.chats.write().await.remove(&id)
    }

    /// Returns every chat, most recent activity first.
    pub async fn list(&self) -> Vec<Chat> {
        let mut chats: Vec<Chat> = self.chats.read().await.values().cloned().collect();
        chats.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(a.id.cmp(&b.id)));
        chats
    }

    pub async fn len(&self) -> usize {
        self.chats.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.chats.read().await.is_empty()
    }
}
