//! Wire and domain types shared by the sync and stream clients.
//!
//! Types prefixed `Wire` or `Remote` carry ciphertext exactly as the service
//! sends it. They only become [`Message`] or [`Chat`] after passing through
//! [`Session`](crate::session::Session), so plaintext and ciphertext cannot be
//! mixed up by accident.

use serde::{Deserialize, Deserializer, Serialize};

pub use pulsesms_storage::{Chat, ConversationId};

/// Opaque identifier of a mirror account.
pub type AccountId = String;

/// Server-side id of a message.
pub type MessageId = i64;

/// Client-chosen id of a message slot on a device.
pub type DeviceId = i64;

/// Message type codes used by the service.
pub mod message_type {
    pub const RECEIVED: i32 = 0;
    pub const SENT: i32 = 1;
    /// Outbound message submitted by this client.
    pub const SENDING: i32 = 2;
    pub const ERROR: i32 = 3;
    pub const DELIVERED: i32 = 4;
    pub const INFO: i32 = 5;
    pub const MEDIA: i32 = 6;
}

/// Mime type attached to every text message this client sends.
pub const TEXT_MIME_TYPE: &str = "text/plain";

/// `sent_device` value identifying a non-phone client.
pub const SENT_DEVICE: DeviceId = 1;

/// Treats a JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A message as received from the service: `data`, `mime_type` and
/// `snippet` are still ciphertext.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireMessage {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub device_id: DeviceId,
    #[serde(rename = "type")]
    pub message_type: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub data: String,
    pub timestamp: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub mime_type: String,
    pub read: bool,
    pub seen: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub from: String,
    pub archive: bool,
    pub sent_device: DeviceId,
    #[serde(deserialize_with = "null_as_default")]
    pub sim_stamp: String,
    #[serde(deserialize_with = "null_as_default")]
    pub snippet: String,
}

/// A decrypted SMS/MMS record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub device_id: DeviceId,
    pub message_type: i32,
    pub data: String,
    pub timestamp: i64,
    pub mime_type: String,
    pub read: bool,
    pub seen: bool,
    pub from: String,
    pub archive: bool,
    pub sent_device: DeviceId,
    pub sim_stamp: String,
    pub snippet: String,
}

impl Message {
    /// Returns true for plain text bodies (as opposed to media references).
    pub fn is_text(&self) -> bool {
        self.mime_type.is_empty() || self.mime_type.starts_with("text/")
    }

    /// Text to show as the conversation preview for this message.
    pub fn preview(&self) -> &str {
        if !self.snippet.is_empty() {
            &self.snippet
        } else if self.is_text() {
            &self.data
        } else {
            ""
        }
    }
}

/// A conversation as listed by the service; `title`, `snippet` and
/// `phone_numbers` are ciphertext.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConversation {
    pub id: i64,
    /// Conversation id shared with messages (`Message::conversation_id`).
    pub device_id: ConversationId,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub snippet: String,
    #[serde(deserialize_with = "null_as_default")]
    pub phone_numbers: String,
    pub timestamp: i64,
    pub read: bool,
    pub archive: bool,
    pub pinned: bool,
    pub mute: bool,
    pub private_notifications: bool,
    pub color: i64,
}

/// Body of `POST /v1/messages`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub account_id: AccountId,
    pub data: String,
    pub device_conversation_id: ConversationId,
    pub device_id: DeviceId,
    pub message_type: i32,
    pub mime_type: String,
    pub read: bool,
    pub seen: bool,
    pub sent_device: DeviceId,
    /// Unix time in milliseconds, the same unit the service returns.
    pub timestamp: i64,
}

/// Body of `POST /v1/conversations/update/{id}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateConversationRequest {
    pub account_id: AccountId,
    pub read: bool,
    /// Unix time in milliseconds.
    pub timestamp: i64,
    pub snippet: String,
}

/// Body of `POST /v1/accounts/login`.
#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Account details returned by a successful login.
#[derive(Clone, Debug, Deserialize)]
pub struct LoginResponse {
    pub account_id: AccountId,
    pub salt1: String,
    pub salt2: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// Outcome of a successful send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendReceipt {
    pub device_id: DeviceId,
    pub conversation_id: ConversationId,
    pub timestamp: i64,
    /// Plaintext preview recorded for the conversation.
    pub snippet: String,
}
