//! Client configuration.

use crate::error::{PulseError, PulseResult};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the sync and stream clients.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PulseConfig {
    /// Base URL for the REST API (e.g., "https://api.pulsesms.app/api").
    pub api_base_url: String,

    /// Push stream endpoint; the account id is appended as a query parameter.
    pub stream_url: String,

    /// Per-request timeout for REST calls (seconds).
    pub request_timeout_secs: u64,

    /// How long shutdown waits for the server to acknowledge a close frame.
    pub close_timeout_ms: u64,

    /// Capacity of the queue between the stream reader and the message handler.
    pub handler_queue_capacity: usize,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.pulsesms.app/api".to_string(),
            stream_url: "wss://api.pulsesms.app/api/v1/stream".to_string(),
            request_timeout_secs: 60,
            close_timeout_ms: 1000,
            handler_queue_capacity: 64,
        }
    }
}

impl PulseConfig {
    /// Checks that every field holds a usable value.
    pub fn validate(&self) -> PulseResult<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(PulseError::Config("api_base_url must not be empty".into()));
        }
        let stream_url = Url::parse(&self.stream_url).map_err(|e| {
            PulseError::Config(format!("invalid stream_url {:?}: {e}", self.stream_url))
        })?;
        if !matches!(stream_url.scheme(), "ws" | "wss") {
            return Err(PulseError::Config(format!(
                "stream_url must use ws:// or wss://, got {:?}",
                self.stream_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(PulseError::Config("request_timeout_secs must be positive".into()));
        }
        if self.close_timeout_ms == 0 {
            return Err(PulseError::Config("close_timeout_ms must be positive".into()));
        }
        if self.handler_queue_capacity == 0 {
            return Err(PulseError::Config("handler_queue_capacity must be positive".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    /// Joins an API path onto the base URL.
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url.trim_end_matches('/'), path)
    }
}
