//! Pull-based sync against the Pulse REST API.
//!
//! Lists conversations, pages through messages and submits outbound
//! messages. Inbound ciphertext is decrypted before anything is returned or
//! written to the store; outbound text is encrypted before it is sent.

use crate::config::PulseConfig;
use crate::error::{PulseError, PulseResult};
use crate::ids::IdGenerator;
use crate::session::Session;
use crate::types::*;
use pulsesms_storage::ConversationStore;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Maximum number of messages returned per page.
pub const MESSAGE_PAGE_SIZE: usize = 70;

/// Builds the shared HTTP client with the configured request timeout.
pub(crate) fn http_client(config: &PulseConfig) -> PulseResult<Client> {
    Ok(Client::builder()
        .timeout(config.request_timeout())
        .build()?)
}

/// HTTP client for conversation and message sync.
pub struct SyncClient {
    client: Client,
    config: PulseConfig,
    session: Arc<Session>,
    store: ConversationStore,
    ids: IdGenerator,
}

impl SyncClient {
    pub fn new(
        config: PulseConfig,
        session: Arc<Session>,
        store: ConversationStore,
    ) -> PulseResult<Self> {
        config.validate()?;
        Ok(Self {
            client: http_client(&config)?,
            config,
            session,
            store,
            ids: IdGenerator::new(),
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    // ── Requests ──

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> PulseResult<T> {
        let url = self.config.endpoint(path);
        let resp = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| PulseError::Network(e.to_string()))?;

        let body = resp.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| PulseError::Decode(format!("GET {path}: {e}")))
    }

    async fn post_json(&self, path: &str, body: &impl Serialize) -> PulseResult<()> {
        let url = self.config.endpoint(path);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| PulseError::Network(e.to_string()))?;

        debug!("POST {path} -> {}", resp.status());
        Ok(())
    }

    // ── Conversations ──

    /// Fetches every conversation, decrypts it, and folds it into the store.
    ///
    /// Nothing is written to the store unless the whole listing decrypts.
    pub async fn list_conversations(&self) -> PulseResult<Vec<Chat>> {
        let remote: Vec<RemoteConversation> = self
            .get_json(
                "/v1/conversations",
                &[("account_id", self.session.account_id().to_string())],
            )
            .await?;

        let chats = remote
            .into_iter()
            .map(|c| self.session.project_conversation(c))
            .collect::<PulseResult<Vec<_>>>()?;

        self.store.upsert_all(chats.iter().cloned()).await;
        debug!("synced {} conversations", chats.len());
        Ok(chats)
    }

    /// Refreshes the store from the remote conversation list.
    pub async fn sync(&self) -> PulseResult<usize> {
        let chats = self.list_conversations().await?;
        info!("sync complete: {} conversations", chats.len());
        Ok(chats.len())
    }

    /// Pushes conversation metadata (encrypted snippet, timestamp, read flag).
    pub async fn update_conversation(
        &self,
        conversation_id: ConversationId,
        encrypted_snippet: String,
        timestamp: i64,
        read: bool,
    ) -> PulseResult<()> {
        let req = UpdateConversationRequest {
            account_id: self.session.account_id().to_string(),
            read,
            timestamp,
            snippet: encrypted_snippet,
        };
        self.post_json(&format!("/v1/conversations/update/{conversation_id}"), &req)
            .await
    }

    // ── Messages ──

    /// Fetches one page of a conversation's messages, newest first.
    ///
    /// Fails as a whole if any message on the page cannot be decrypted.
    pub async fn get_messages(
        &self,
        conversation_id: ConversationId,
        offset: u32,
    ) -> PulseResult<Vec<Message>> {
        let mut wire: Vec<WireMessage> = self
            .get_json(
                "/v1/messages",
                &[
                    ("account_id", self.session.account_id().to_string()),
                    ("conversation_id", conversation_id.to_string()),
                    ("offset", offset.to_string()),
                    ("limit", MESSAGE_PAGE_SIZE.to_string()),
                ],
            )
            .await?;

        if wire.len() > MESSAGE_PAGE_SIZE {
            warn!(
                "server returned {} messages for conversation {conversation_id}, keeping {MESSAGE_PAGE_SIZE}",
                wire.len()
            );
            wire.truncate(MESSAGE_PAGE_SIZE);
        }

        self.session.decrypt_messages(wire)
    }

    /// Sends a text message and updates the conversation's preview.
    ///
    /// A failure of the follow-up update is reported as
    /// [`PulseError::ConversationUpdate`]: the message itself was accepted.
    pub async fn send_message(
        &self,
        text: &str,
        conversation_id: ConversationId,
    ) -> PulseResult<SendReceipt> {
        let device_id = self.ids.next_id();
        let snippet = format!("You: {text}");

        let data = self.session.encrypt(text);
        let mime_type = self.session.encrypt(TEXT_MIME_TYPE);
        let encrypted_snippet = self.session.encrypt(&snippet);

        let timestamp = chrono::Utc::now().timestamp_millis();

        let req = SendMessageRequest {
            account_id: self.session.account_id().to_string(),
            data,
            device_conversation_id: conversation_id,
            device_id,
            message_type: message_type::SENDING,
            mime_type,
            read: false,
            seen: false,
            sent_device: SENT_DEVICE,
            timestamp,
        };

        self.post_json("/v1/messages", &req).await?;
        info!("sent message {device_id} to conversation {conversation_id}");

        self.store
            .record_activity(conversation_id, &snippet, timestamp, true)
            .await;

        if let Err(e) = self
            .update_conversation(conversation_id, encrypted_snippet, timestamp, true)
            .await
        {
            warn!("conversation {conversation_id} update failed after send: {e}");
            return Err(PulseError::ConversationUpdate {
                device_id,
                reason: e.to_string(),
            });
        }

        Ok(SendReceipt {
            device_id,
            conversation_id,
            timestamp,
            snippet,
        })
    }
}
