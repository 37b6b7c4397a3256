//! Shared helpers: fixed key material, local mock servers and frame builders.
#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use pulsesms_cloud::{PulseConfig, Session};
use pulsesms_crypto::KeyMaterial;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message as WsMessage;

pub const ACCOUNT: &str = "acct-test";
pub const PASSWORD: &str = "correct horse";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn test_keys() -> KeyMaterial {
    KeyMaterial::derive(ACCOUNT, PASSWORD, b"salt-one", b"salt-two").expect("derive test keys")
}

pub fn test_session() -> Session {
    Session::new(ACCOUNT, test_keys())
}

/// Config pointing the REST side at `api_base_url` and the push side at `stream_url`.
pub fn test_config(api_base_url: &str, stream_url: &str) -> PulseConfig {
    PulseConfig {
        api_base_url: api_base_url.to_string(),
        stream_url: stream_url.to_string(),
        request_timeout_secs: 5,
        close_timeout_ms: 200,
        handler_queue_capacity: 8,
    }
}

/// An `added_message` push frame with the given plaintext body.
pub fn added_message_frame(
    session: &Session,
    id: i64,
    conversation_id: i64,
    text: &str,
    timestamp: i64,
) -> String {
    serde_json::json!({
        "identifier": pulsesms_cloud::stream::NOTIFICATIONS_CHANNEL,
        "message": {
            "operation": "added_message",
            "content": {
                "id": id,
                "conversation_id": conversation_id,
                "type": pulsesms_cloud::message_type::RECEIVED,
                "data": session.encrypt(text),
                "mime_type": session.encrypt("text/plain"),
                "timestamp": timestamp,
                "read": false,
                "seen": false
            }
        }
    })
    .to_string()
}

/// How the local push server behaves after the client subscribes.
pub enum PushScript {
    /// Send these frames in order, then close the connection.
    FramesThenClose(Vec<String>),
    /// Wait, send these frames, then hold the connection open.
    FramesAfter(Duration, Vec<String>),
    /// Accept and subscribe, then never send or read anything again.
    Silent,
}

pub struct PushServer {
    pub url: String,
    /// First text frame the client sent (its subscribe command).
    pub subscribe: oneshot::Receiver<String>,
    /// Whether the client answered the server's close frame. Only reported
    /// by `FramesThenClose`.
    pub close_acked: oneshot::Receiver<bool>,
}

/// Starts a single-connection websocket server on a random local port.
pub async fn push_server(script: PushScript) -> PushServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (subscribed_tx, subscribed_rx) = oneshot::channel();
    let (acked_tx, acked_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.expect("accept");
        let mut ws = tokio_tungstenite::accept_async(tcp).await.expect("handshake");

        if let Some(Ok(WsMessage::Text(text))) = ws.next().await {
            let _ = subscribed_tx.send(text);
        }

        match script {
            PushScript::FramesThenClose(frames) => {
                for frame in frames {
                    if ws.send(WsMessage::Text(frame)).await.is_err() {
                        return;
                    }
                }
                let _ = ws.close(None).await;
                let mut acked = false;
                while let Some(Ok(message)) = ws.next().await {
                    acked |= matches!(message, WsMessage::Close(_));
                }
                let _ = acked_tx.send(acked);
            }
            PushScript::FramesAfter(delay, frames) => {
                tokio::time::sleep(delay).await;
                for frame in frames {
                    if ws.send(WsMessage::Text(frame)).await.is_err() {
                        return;
                    }
                }
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            PushScript::Silent => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                drop(ws);
            }
        }
    });

    PushServer {
        url: format!("ws://{addr}/v1/stream"),
        subscribe: subscribed_rx,
        close_acked: acked_rx,
    }
}

/// Accepts TCP connections but never answers the websocket handshake.
pub async fn stalled_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let (_tcp, _) = listener.accept().await.expect("accept");
        tokio::time::sleep(Duration::from_secs(30)).await;
    });
    format!("ws://{addr}/v1/stream")
}

/// A local address with nothing listening on it.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    listener.local_addr().expect("local addr")
}
