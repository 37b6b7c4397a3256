//! Sync and streaming client for the Pulse SMS cloud mirror.
//!
//! Keeps a local, in-memory view of an account's conversations in step with
//! the service:
//! - REST sync for conversation listings, message paging and sending
//! - A websocket push stream for messages as they arrive
//! - Field-level AES encryption of all message content via `pulsesms-crypto`
//! - Ordered delivery of decrypted messages to a single registered handler

pub mod api_client;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod ids;
pub mod session;
pub mod stream;
pub mod types;

pub use client::PulseClient;
pub use config::PulseConfig;
pub use error::{PulseError, PulseResult};
pub use session::Session;
pub use stream::{StreamExit, StreamState};
pub use types::*;
