//! In-memory conversation store for the Pulse SMS mirror client.
//!
//! The store is the device's view of its conversation list. Two independent
//! producers write into it: the REST sync path (full conversation listings)
//! and the realtime stream (one message at a time). Access goes through an
//! internal `RwLock`, so clones of a [`ConversationStore`] can be handed to
//! both producers without external coordination.

mod conversation_store;

pub use conversation_store::{Chat, ConversationId, ConversationStore};
