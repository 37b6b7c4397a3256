//! Per-account session: the account id plus its immutable key material.
//!
//! Both the sync and the stream client hold the same `Arc<Session>`. Every
//! conversion from a wire type to a domain type happens here, which is what
//! keeps ciphertext out of the store and out of message handlers.

use crate::api_client::http_client;
use crate::config::PulseConfig;
use crate::error::{PulseError, PulseResult};
use crate::types::*;
use pulsesms_crypto::{CryptoResult, KeyMaterial};
use std::sync::Arc;
use tracing::{debug, info};

/// An authenticated account and the keys that protect its content.
#[derive(Debug)]
pub struct Session {
    account_id: AccountId,
    keys: Arc<KeyMaterial>,
}

impl Session {
    pub fn new(account_id: impl Into<AccountId>, keys: KeyMaterial) -> Self {
        Self {
            account_id: account_id.into(),
            keys: Arc::new(keys),
        }
    }

    /// Restores a session from a saved password hash and primary salt.
    pub fn restore(account_id: &str, pw_key_hash: &str, salt1: &str) -> PulseResult<Self> {
        let keys = KeyMaterial::from_password_hash(account_id, pw_key_hash, salt1.as_bytes())?;
        Ok(Self::new(account_id, keys))
    }

    /// Logs in with account credentials and derives the session keys.
    pub async fn login(config: &PulseConfig, username: &str, password: &str) -> PulseResult<Self> {
        let client = http_client(config)?;
        let url = config.endpoint("/v1/accounts/login");

        let resp = client
            .post(&url)
            .json(&LoginRequest { username, password })
            .send()
            .await?
            .error_for_status()
            .map_err(|e| PulseError::AuthFailed(e.to_string()))?;

        let body = resp.bytes().await?;
        let account: LoginResponse = serde_json::from_slice(&body)
            .map_err(|e| PulseError::Decode(format!("login response: {e}")))?;

        let keys = KeyMaterial::derive(
            &account.account_id,
            password,
            account.salt1.as_bytes(),
            account.salt2.as_bytes(),
        )?;
        info!("logged in to account {}", account.account_id);

        Ok(Self::new(account.account_id, keys))
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn keys(&self) -> &Arc<KeyMaterial> {
        &self.keys
    }

    /// Encrypts a text field for the wire.
    pub fn encrypt(&self, plaintext: &str) -> String {
        self.keys.encrypt(plaintext)
    }

    /// Decrypts a text field. Empty fields carry no ciphertext and stay empty.
    pub fn decrypt_field(&self, field: &str) -> CryptoResult<String> {
        if field.is_empty() {
            return Ok(String::new());
        }
        self.keys.decrypt(field)
    }

    /// Decrypts every ciphertext field of a message.
    pub fn decrypt_message(&self, wire: WireMessage) -> PulseResult<Message> {
        let data = self.decrypt_field(&wire.data)?;
        let mime_type = self.decrypt_field(&wire.mime_type)?;
        let snippet = self.decrypt_field(&wire.snippet)?;

        Ok(Message {
            id: wire.id,
            conversation_id: wire.conversation_id,
            device_id: wire.device_id,
            message_type: wire.message_type,
            data,
            timestamp: wire.timestamp,
            mime_type,
            read: wire.read,
            seen: wire.seen,
            from: wire.from,
            archive: wire.archive,
            sent_device: wire.sent_device,
            sim_stamp: wire.sim_stamp,
            snippet,
        })
    }

    /// Decrypts a page of messages, failing the whole page on any error.
    pub fn decrypt_messages(&self, wire: Vec<WireMessage>) -> PulseResult<Vec<Message>> {
        wire.into_iter()
            .map(|m| {
                let id = m.id;
                self.decrypt_message(m).inspect_err(|e| {
                    debug!("message {id} failed to decrypt: {e}");
                })
            })
            .collect()
    }

    /// Projects a remote conversation into the local [`Chat`] shape.
    pub fn project_conversation(&self, remote: RemoteConversation) -> PulseResult<Chat> {
        Ok(Chat {
            id: remote.device_id,
            title: self.decrypt_field(&remote.title)?,
            snippet: self.decrypt_field(&remote.snippet)?,
            timestamp: remote.timestamp,
            read: remote.read,
            archived: remote.archive,
        })
    }
}
