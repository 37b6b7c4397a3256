//! Delivery of decrypted messages to the application's handler.
//!
//! The stream reader pushes messages into a bounded queue and a single
//! consumer task drains it, so the handler sees messages in arrival order
//! and a slow handler back-pressures the reader instead of piling up tasks.

use crate::types::Message;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Callback invoked with each decrypted inbound message.
pub type MessageHandler = Arc<dyn Fn(Message) + Send + Sync + 'static>;

/// Holds the currently registered handler. Registering replaces it.
#[derive(Clone, Default)]
pub struct HandlerSlot {
    handler: Arc<RwLock<Option<MessageHandler>>>,
}

impl HandlerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, handler: MessageHandler) {
        *self.handler.write().await = Some(handler);
    }

    pub async fn current(&self) -> Option<MessageHandler> {
        self.handler.read().await.clone()
    }
}

/// Producer side of the handler queue for one stream session.
pub(crate) struct Dispatcher {
    tx: mpsc::Sender<Message>,
    consumer: JoinHandle<()>,
}

impl Dispatcher {
    /// Starts the consumer task for `slot`.
    pub(crate) fn spawn(slot: HandlerSlot, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        let consumer = tokio::spawn(run_consumer(rx, slot));
        Self { tx, consumer }
    }

    /// Queues a message, waiting while the queue is full.
    ///
    /// Returns `false` if the consumer has gone away.
    pub(crate) async fn dispatch(&self, message: Message) -> bool {
        self.tx.send(message).await.is_ok()
    }

    /// Closes the queue and waits for queued messages to be handled.
    pub(crate) async fn drain(self) {
        drop(self.tx);
        if let Err(e) = self.consumer.await {
            error!("message consumer task failed: {e}");
        }
    }
}

async fn run_consumer(mut rx: mpsc::Receiver<Message>, slot: HandlerSlot) {
    while let Some(message) = rx.recv().await {
        let Some(handler) = slot.current().await else {
            debug!("no message handler registered, dropping message {}", message.id);
            continue;
        };

        let id = message.id;
        // The handler is synchronous user code; keep it off the async workers.
        if let Err(e) = tokio::task::spawn_blocking(move || handler(message)).await {
            error!("message handler panicked on message {id}: {e}");
        }
    }
}
