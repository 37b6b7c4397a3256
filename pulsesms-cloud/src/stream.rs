//! Realtime push stream.
//!
//! Opens one websocket to the mirror service, subscribes to the
//! notifications channel and turns inbound frames into store updates and
//! handler deliveries. The connection is not re-dialed: a dial failure ends
//! the session and is returned to the caller.
//!
//! ```text
//! Disconnected -> Connecting -> Subscribed -> Reading -> [Closing] -> Disconnected
//! ```

use crate::config::PulseConfig;
use crate::dispatch::{Dispatcher, HandlerSlot};
use crate::error::{PulseError, PulseResult};
use crate::session::Session;
use crate::types::WireMessage;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, Stream, StreamExt};
use pulsesms_storage::ConversationStore;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

/// Identifier of the single channel this client subscribes to.
pub const NOTIFICATIONS_CHANNEL: &str = r#"{"channel":"NotificationsChannel"}"#;

/// Lifecycle of the push connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Disconnected,
    Connecting,
    Subscribed,
    Reading,
    Closing,
}

/// Why [`StreamClient::stream`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamExit {
    /// The server closed the connection or a read failed.
    ServerClosed,
    /// The shutdown signal fired and the close handshake ran (or timed out).
    Interrupted,
}

/// What happened to a single inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A message was decrypted and queued for the handler.
    Delivered,
    /// A recognised frame with nothing to do.
    Ignored,
    /// The frame could not be decoded or decrypted.
    Dropped,
}

/// Client-to-server channel command.
#[derive(Debug, Serialize)]
pub struct SubscribeCommand<'a> {
    pub command: &'a str,
    pub identifier: &'a str,
}

impl SubscribeCommand<'static> {
    pub fn notifications() -> Self {
        Self {
            command: "subscribe",
            identifier: NOTIFICATIONS_CHANNEL,
        }
    }
}

/// Server-to-client frame wrapper.
///
/// Protocol frames (`welcome`, `ping`, `confirm_subscription`) carry a `type`
/// and either no `message` or a non-object one.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    identifier: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    message: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Notification {
    operation: String,
    #[serde(default)]
    content: serde_json::Value,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    AddedMessage(WireMessage),
    RemovedMessage,
    ReadConversation,
    UpdatedConversation,
    /// A notification with an operation this client does not handle.
    Unknown(String),
    /// A protocol frame such as a ping or subscription confirmation.
    Control(Option<String>),
}

/// Decodes one text frame.
pub fn parse_frame(text: &str) -> PulseResult<StreamEvent> {
    let envelope: Envelope = serde_json::from_str(text)
        .map_err(|e| PulseError::Decode(format!("invalid stream envelope: {e}")))?;

    let message = match envelope.message {
        Some(message @ serde_json::Value::Object(_)) => message,
        _ => return Ok(StreamEvent::Control(envelope.kind)),
    };

    let notification: Notification = serde_json::from_value(message)
        .map_err(|e| PulseError::Decode(format!("invalid notification: {e}")))?;

    let event = match notification.operation.as_str() {
        "added_message" => {
            let wire: WireMessage = serde_json::from_value(notification.content)
                .map_err(|e| PulseError::Decode(format!("invalid added_message content: {e}")))?;
            StreamEvent::AddedMessage(wire)
        }
        "removed_message" => StreamEvent::RemovedMessage,
        "read_conversation" => StreamEvent::ReadConversation,
        "updated_conversation" => StreamEvent::UpdatedConversation,
        other => StreamEvent::Unknown(other.to_string()),
    };

    if let Some(identifier) = envelope.identifier.as_deref() {
        if identifier != NOTIFICATIONS_CHANNEL {
            debug!("notification on unexpected channel {identifier}");
        }
    }

    Ok(event)
}

/// Applies decoded frames to the store and the handler queue.
#[derive(Clone)]
struct FrameHandler {
    session: Arc<Session>,
    store: ConversationStore,
}

impl FrameHandler {
    async fn handle(&self, text: &str, dispatcher: &Dispatcher) -> FrameOutcome {
        let event = match parse_frame(text) {
            Ok(event) => event,
            Err(e) => {
                warn!("dropping stream frame: {e}");
                return FrameOutcome::Dropped;
            }
        };

        match event {
            StreamEvent::AddedMessage(wire) => {
                let id = wire.id;
                let message = match self.session.decrypt_message(wire) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!("dropping added_message {id}: {e}");
                        return FrameOutcome::Dropped;
                    }
                };

                self.store
                    .record_activity(
                        message.conversation_id,
                        message.preview(),
                        message.timestamp,
                        message.read,
                    )
                    .await;

                if dispatcher.dispatch(message).await {
                    FrameOutcome::Delivered
                } else {
                    error!("message consumer stopped, dropping message {id}");
                    FrameOutcome::Dropped
                }
            }
            reserved @ (StreamEvent::RemovedMessage
            | StreamEvent::ReadConversation
            | StreamEvent::UpdatedConversation) => {
                debug!("ignoring {reserved:?}");
                FrameOutcome::Ignored
            }
            StreamEvent::Unknown(operation) => {
                debug!("ignoring unknown stream operation {operation}");
                FrameOutcome::Ignored
            }
            StreamEvent::Control(_) => FrameOutcome::Ignored,
        }
    }
}

/// Reads frames until the server closes the stream or a read fails, then
/// drains the handler queue.
async fn read_loop<S>(mut source: S, frames: FrameHandler, dispatcher: Dispatcher)
where
    S: Stream<Item = Result<WsMessage, tungstenite::Error>> + Unpin,
{
    while let Some(frame) = source.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => {
                frames.handle(&text, &dispatcher).await;
            }
            Ok(WsMessage::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => {
                    frames.handle(text, &dispatcher).await;
                }
                Err(_) => warn!("dropping non-UTF-8 binary frame ({} bytes)", bytes.len()),
            },
            // Keep polling so the queued close reply is flushed; the stream
            // ends once the handshake completes.
            Ok(WsMessage::Close(frame)) => debug!("server closed push stream: {frame:?}"),
            Ok(_) => {}
            Err(e) => {
                warn!("push stream read failed: {e}");
                break;
            }
        }
    }
    dispatcher.drain().await;
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Aborts the reader task when dropped.
struct ReaderTask(JoinHandle<()>);

impl Drop for ReaderTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Puts the published state back to `Disconnected` when `stream()` ends,
/// whether it returned or its future was dropped.
struct DisconnectOnDrop<'a>(&'a watch::Sender<StreamState>);

impl Drop for DisconnectOnDrop<'_> {
    fn drop(&mut self) {
        let prev = self.0.send_replace(StreamState::Disconnected);
        if prev != StreamState::Disconnected {
            debug!("push stream {prev:?} -> Disconnected");
        }
    }
}

/// Long-lived push connection for one account.
pub struct StreamClient {
    config: PulseConfig,
    session: Arc<Session>,
    store: ConversationStore,
    handlers: HandlerSlot,
    state: watch::Sender<StreamState>,
}

impl StreamClient {
    pub fn new(
        config: PulseConfig,
        session: Arc<Session>,
        store: ConversationStore,
        handlers: HandlerSlot,
    ) -> Self {
        let (state, _) = watch::channel(StreamState::Disconnected);
        Self {
            config,
            session,
            store,
            handlers,
            state,
        }
    }

    pub fn state(&self) -> StreamState {
        *self.state.borrow()
    }

    /// Subscribes to lifecycle transitions.
    pub fn watch_state(&self) -> watch::Receiver<StreamState> {
        self.state.subscribe()
    }

    pub fn handlers(&self) -> &HandlerSlot {
        &self.handlers
    }

    /// Full push URL including the account query parameter.
    pub fn stream_url(&self) -> PulseResult<Url> {
        let mut url = Url::parse(&self.config.stream_url).map_err(|e| {
            PulseError::Config(format!("invalid stream_url {:?}: {e}", self.config.stream_url))
        })?;
        url.query_pairs_mut()
            .append_pair("account_id", self.session.account_id());
        Ok(url)
    }

    fn set_state(&self, next: StreamState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!("push stream {prev:?} -> {next:?}");
        }
    }

    /// Dials the push endpoint and subscribes to the notifications channel.
    async fn connect(&self) -> PulseResult<(SplitSink<Socket, WsMessage>, SplitStream<Socket>)> {
        let url = self.stream_url()?;
        let (socket, _) = connect_async(url.as_str()).await.map_err(|e| {
            error!("push stream dial failed: {e}");
            PulseError::Dial(e.to_string())
        })?;
        let (mut sink, source) = socket.split();

        let subscribe = serde_json::to_string(&SubscribeCommand::notifications())?;
        sink.send(WsMessage::Text(subscribe)).await.inspect_err(|e| {
            error!("push stream subscribe failed: {e}");
        })?;
        self.set_state(StreamState::Subscribed);

        Ok((sink, source))
    }

    /// Runs the push stream until the server closes it or `shutdown` fires.
    ///
    /// On shutdown a close frame is sent and the read loop gets
    /// `close_timeout` to finish before it is abandoned. Shutdown also
    /// cancels a dial that is still in progress. Dropping the returned
    /// future stops the read loop.
    pub async fn stream<F>(&self, shutdown: F) -> PulseResult<StreamExit>
    where
        F: Future<Output = ()>,
    {
        let _disconnect = DisconnectOnDrop(&self.state);
        self.set_state(StreamState::Connecting);
        info!("connecting to push stream");

        tokio::pin!(shutdown);
        let (mut sink, source) = tokio::select! {
            connected = self.connect() => connected?,
            _ = &mut shutdown => {
                info!("shutdown requested while connecting");
                return Ok(StreamExit::Interrupted);
            }
        };

        let dispatcher = Dispatcher::spawn(self.handlers.clone(), self.config.handler_queue_capacity);
        let frames = FrameHandler {
            session: Arc::clone(&self.session),
            store: self.store.clone(),
        };
        let mut reader = ReaderTask(tokio::spawn(read_loop(source, frames, dispatcher)));
        self.set_state(StreamState::Reading);

        let interrupted = tokio::select! {
            result = &mut reader.0 => {
                if let Err(e) = result {
                    error!("push stream reader failed: {e}");
                }
                false
            }
            _ = &mut shutdown => true,
        };

        if !interrupted {
            info!("push stream ended by server");
            return Ok(StreamExit::ServerClosed);
        }

        self.set_state(StreamState::Closing);
        info!("shutdown requested, closing push stream");

        let close = WsMessage::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        }));
        match sink.send(close).await {
            Ok(()) => {
                let timeout = self.config.close_timeout();
                if tokio::time::timeout(timeout, &mut reader.0).await.is_err() {
                    warn!("server did not acknowledge close within {timeout:?}");
                }
            }
            Err(e) => warn!("failed to send close frame: {e}"),
        }

        Ok(StreamExit::Interrupted)
    }
}
