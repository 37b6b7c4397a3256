//! Client error types.

use crate::types::DeviceId;
use pulsesms_crypto::CryptoError;
use thiserror::Error;

/// Result type for client operations.
pub type PulseResult<T> = Result<T, PulseError>;

/// Errors that can occur while syncing or streaming.
#[derive(Debug, Error)]
pub enum PulseError {
    #[error("API request failed: {0}")]
    Network(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("push stream dial failed: {0}")]
    Dial(String),

    #[error("push stream error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The message reached the server but the follow-up conversation update
    /// did not, so the remote conversation list may show a stale snippet.
    #[error("message {device_id} was sent but the conversation update failed: {reason}")]
    ConversationUpdate { device_id: DeviceId, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PulseError {
    /// Returns true for transport and HTTP status failures.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Http(_) | Self::Dial(_) | Self::WebSocket(_)
        )
    }

    /// Returns true when ciphertext could not be decrypted.
    pub fn is_decryption(&self) -> bool {
        matches!(self, Self::Crypto(CryptoError::Decryption(_)))
    }

    /// Returns true when a body or frame did not have the expected shape.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::Serialization(_))
    }

    /// Returns true when the failed operation still delivered a message.
    pub fn message_was_sent(&self) -> bool {
        matches!(self, Self::ConversationUpdate { .. })
    }
}
