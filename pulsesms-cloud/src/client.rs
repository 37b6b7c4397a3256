//! Account-level facade tying the session, store, sync and stream together.

use crate::api_client::SyncClient;
use crate::config::PulseConfig;
use crate::dispatch::HandlerSlot;
use crate::error::PulseResult;
use crate::session::Session;
use crate::stream::{StreamClient, StreamExit};
use crate::types::*;
use pulsesms_storage::ConversationStore;
use std::future::Future;
use std::sync::Arc;

/// One account's view of the mirror service.
///
/// The sync and stream clients share the session keys and the conversation
/// store but never talk to each other.
pub struct PulseClient {
    session: Arc<Session>,
    store: ConversationStore,
    sync: SyncClient,
    stream: StreamClient,
}

impl PulseClient {
    /// Builds a client around an existing session with an empty store.
    pub fn new(config: PulseConfig, session: Session) -> PulseResult<Self> {
        config.validate()?;
        let session = Arc::new(session);
        let store = ConversationStore::new();

        let sync = SyncClient::new(config.clone(), Arc::clone(&session), store.clone())?;
        let stream = StreamClient::new(
            config,
            Arc::clone(&session),
            store.clone(),
            HandlerSlot::new(),
        );

        Ok(Self {
            session,
            store,
            sync,
            stream,
        })
    }

    /// Logs in and builds a client for the account.
    pub async fn login(config: PulseConfig, username: &str, password: &str) -> PulseResult<Self> {
        config.validate()?;
        let session = Session::login(&config, username, password).await?;
        Self::new(config, session)
    }

    pub fn account_id(&self) -> &str {
        self.session.account_id()
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn sync_client(&self) -> &SyncClient {
        &self.sync
    }

    pub fn stream_client(&self) -> &StreamClient {
        &self.stream
    }

    /// Refreshes the store from the remote conversation list.
    pub async fn sync(&self) -> PulseResult<usize> {
        self.sync.sync().await
    }

    pub async fn list_conversations(&self) -> PulseResult<Vec<Chat>> {
        self.sync.list_conversations().await
    }

    pub async fn get_messages(
        &self,
        conversation_id: ConversationId,
        offset: u32,
    ) -> PulseResult<Vec<Message>> {
        self.sync.get_messages(conversation_id, offset).await
    }

    pub async fn send_message(
        &self,
        text: &str,
        conversation_id: ConversationId,
    ) -> PulseResult<SendReceipt> {
        self.sync.send_message(text, conversation_id).await
    }

    /// Registers the callback for inbound messages, replacing any previous one.
    pub async fn set_message_handler<F>(&self, handler: F)
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        self.stream.handlers().set(Arc::new(handler)).await;
    }

    /// Runs the push stream until the server closes it or `shutdown` fires.
    pub async fn stream<F>(&self, shutdown: F) -> PulseResult<StreamExit>
    where
        F: Future<Output = ()>,
    {
        self.stream.stream(shutdown).await
    }
}
