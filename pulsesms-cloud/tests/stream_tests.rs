mod support;

use pretty_assertions::assert_eq;
use pulsesms_cloud::{Message, PulseClient, PulseError, StreamExit, StreamState};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use support::*;

fn client_for(stream_url: &str) -> PulseClient {
    init_tracing();
    PulseClient::new(test_config("http://127.0.0.1:1", stream_url), test_session()).unwrap()
}

fn recorder() -> (Arc<Mutex<Vec<Message>>>, impl Fn(Message) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |m: Message| sink.lock().unwrap().push(m))
}

#[tokio::test]
async fn delivers_decryptable_messages_in_order_and_skips_the_rest() {
    let session = test_session();
    let frames = vec![
        r#"{"type":"welcome"}"#.to_string(),
        r#"{"identifier":"{\"channel\":\"NotificationsChannel\"}","type":"confirm_subscription"}"#
            .to_string(),
        added_message_frame(&session, 1, 10, "first", 1_000),
        r#"{"message":{"operation":"typing","content":{}}}"#.to_string(),
        "this is not json".to_string(),
        r#"{"message":{"operation":"added_message","content":{"id":3,"conversation_id":10,"data":"garbage"}}}"#
            .to_string(),
        r#"{"message":{"operation":"removed_message","content":{"id":1}}}"#.to_string(),
        added_message_frame(&session, 2, 10, "second", 2_000),
    ];
    let server = push_server(PushScript::FramesThenClose(frames)).await;

    let client = client_for(&server.url);
    let (seen, handler) = recorder();
    client.set_message_handler(handler).await;

    let exit = client.stream(std::future::pending()).await.unwrap();
    assert_eq!(exit, StreamExit::ServerClosed);
    assert_eq!(client.stream_client().state(), StreamState::Disconnected);

    let bodies: Vec<String> = seen.lock().unwrap().iter().map(|m| m.data.clone()).collect();
    assert_eq!(bodies, vec!["first".to_string(), "second".to_string()]);

    let chat = client.store().get(10).await.unwrap();
    assert_eq!(chat.snippet, "second");
    assert_eq!(chat.timestamp, 2_000);
    assert!(!chat.read);
}

#[tokio::test]
async fn subscribes_to_the_notifications_channel() {
    let server = push_server(PushScript::FramesThenClose(Vec::new())).await;
    let client = client_for(&server.url);

    client.stream(std::future::pending()).await.unwrap();

    let subscribe: serde_json::Value =
        serde_json::from_str(&server.subscribe.await.unwrap()).unwrap();
    assert_eq!(subscribe["command"], "subscribe");
    assert_eq!(subscribe["identifier"], r#"{"channel":"NotificationsChannel"}"#);
}

#[tokio::test]
async fn server_close_is_answered_before_returning() {
    let server = push_server(PushScript::FramesThenClose(Vec::new())).await;
    let client = client_for(&server.url);

    let exit = client.stream(std::future::pending()).await.unwrap();
    assert_eq!(exit, StreamExit::ServerClosed);
    assert!(server.close_acked.await.unwrap());
}

#[tokio::test]
async fn latest_handler_wins() {
    let session = test_session();
    let frames = vec![added_message_frame(&session, 1, 10, "only", 1_000)];
    let server = push_server(PushScript::FramesThenClose(frames)).await;

    let client = client_for(&server.url);
    let (old_seen, old_handler) = recorder();
    let (new_seen, new_handler) = recorder();
    client.set_message_handler(old_handler).await;
    client.set_message_handler(new_handler).await;

    client.stream(std::future::pending()).await.unwrap();

    assert!(old_seen.lock().unwrap().is_empty());
    assert_eq!(new_seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn panicking_handler_does_not_stop_delivery() {
    let session = test_session();
    let frames = vec![
        added_message_frame(&session, 1, 10, "boom", 1_000),
        added_message_frame(&session, 2, 10, "after", 2_000),
    ];
    let server = push_server(PushScript::FramesThenClose(frames)).await;

    let client = client_for(&server.url);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    client
        .set_message_handler(move |m: Message| {
            if m.data == "boom" {
                panic!("handler failure");
            }
            sink.lock().unwrap().push(m.data);
        })
        .await;

    let exit = client.stream(std::future::pending()).await.unwrap();
    assert_eq!(exit, StreamExit::ServerClosed);
    assert_eq!(*seen.lock().unwrap(), vec!["after".to_string()]);
}

#[tokio::test]
async fn messages_without_a_handler_still_update_the_store() {
    let session = test_session();
    let frames = vec![added_message_frame(&session, 1, 77, "unseen", 5_000)];
    let server = push_server(PushScript::FramesThenClose(frames)).await;

    let client = client_for(&server.url);
    client.stream(std::future::pending()).await.unwrap();

    assert_eq!(client.store().get(77).await.unwrap().snippet, "unseen");
}

#[tokio::test]
async fn dial_failure_is_reported_and_state_returns_to_disconnected() {
    let addr = unused_addr().await;
    let client = client_for(&format!("ws://{addr}/v1/stream"));
    let mut states = client.stream_client().watch_state();

    let err = client.stream(std::future::pending()).await.unwrap_err();
    assert!(matches!(err, PulseError::Dial(_)), "got {err:?}");
    assert!(err.is_network());
    assert_eq!(client.stream_client().state(), StreamState::Disconnected);
    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), StreamState::Disconnected);
}

#[tokio::test]
async fn shutdown_closes_within_the_close_timeout() {
    let server = push_server(PushScript::Silent).await;
    let client = client_for(&server.url);

    let started = Instant::now();
    let exit = client
        .stream(tokio::time::sleep(Duration::from_millis(100)))
        .await
        .unwrap();

    assert_eq!(exit, StreamExit::Interrupted);
    assert_eq!(client.stream_client().state(), StreamState::Disconnected);
    // 100ms until shutdown plus a 200ms close timeout, with room for slow CI.
    assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
}

#[tokio::test]
async fn stream_url_carries_encoded_account_id() {
    let client = PulseClient::new(
        test_config("http://127.0.0.1:1", "wss://push.example/api/v1/stream"),
        pulsesms_cloud::Session::new("acct with space", test_keys()),
    )
    .unwrap();
    assert_eq!(
        client.stream_client().stream_url().unwrap().as_str(),
        "wss://push.example/api/v1/stream?account_id=acct+with+space"
    );
}

#[tokio::test]
async fn path_less_stream_url_gets_a_root_path() {
    let client = client_for("ws://127.0.0.1:9000");
    assert_eq!(
        client.stream_client().stream_url().unwrap().as_str(),
        "ws://127.0.0.1:9000/?account_id=acct-test"
    );
}

#[tokio::test]
async fn existing_query_is_kept() {
    let client = client_for("wss://push.example/stream?v=2");
    assert_eq!(
        client.stream_client().stream_url().unwrap().as_str(),
        "wss://push.example/stream?v=2&account_id=acct-test"
    );
}

#[tokio::test]
async fn shutdown_interrupts_a_stalled_handshake() {
    let url = stalled_server().await;
    let client = client_for(&url);

    let result = tokio::time::timeout(
        Duration::from_secs(3),
        client.stream(tokio::time::sleep(Duration::from_millis(100))),
    )
    .await
    .expect("stream() must honour shutdown while dialing");

    assert_eq!(result.unwrap(), StreamExit::Interrupted);
    assert_eq!(client.stream_client().state(), StreamState::Disconnected);
}

#[tokio::test]
async fn dropping_stream_stops_reading() {
    let session = test_session();
    let frames = vec![added_message_frame(&session, 1, 10, "after drop", 1_000)];
    let server = push_server(PushScript::FramesAfter(Duration::from_millis(500), frames)).await;

    let client = client_for(&server.url);
    let (seen, handler) = recorder();
    client.set_message_handler(handler).await;

    let dropped = tokio::time::timeout(
        Duration::from_millis(200),
        client.stream(std::future::pending()),
    )
    .await;
    assert!(dropped.is_err());
    assert_eq!(client.stream_client().state(), StreamState::Disconnected);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(seen.lock().unwrap().is_empty());
    assert!(client.store().get(10).await.is_none());
}
