//! Client-side id generation for outbound messages.
//!
//! The service expects the sender to pick the device id of a new message.
//! Ids are a random per-process offset plus a monotonic counter, so two ids
//! from the same generator never collide and two processes are unlikely to.

use crate::types::DeviceId;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

/// Largest id the service accepts from clients.
pub const MAX_GENERATED_ID: DeviceId = 922_337_203_685_477;

/// Produces ids in `[1, MAX_GENERATED_ID]`.
#[derive(Debug)]
pub struct IdGenerator {
    offset: u64,
    counter: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::with_offset(rand::rng().random_range(0..MAX_GENERATED_ID as u64))
    }

    /// Creates a generator starting at a fixed offset (wrapped into range).
    pub fn with_offset(offset: u64) -> Self {
        Self {
            offset: offset % MAX_GENERATED_ID as u64,
            counter: AtomicU64::new(0),
        }
    }

    /// Returns the next id.
    pub fn next_id(&self) -> DeviceId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let slot = self.offset.wrapping_add(n) % MAX_GENERATED_ID as u64;
        slot as DeviceId + 1
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
