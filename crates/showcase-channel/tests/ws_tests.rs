//! End-to-end tests for the `WebSocket` endpoints and the echo client.
//!
//! Each test serves the router on an ephemeral local port and talks to
//! it with `tokio-tungstenite`.

#![allow(clippy::unwrap_used, clippy::panic, clippy::arithmetic_side_effects)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use showcase_channel::client::{ClientEvent, EchoClient, ReconnectPolicy};
use showcase_channel::server::serve_listener;
use showcase_channel::state::AppState;
use showcase_core::config::ShowcaseConfig;
use showcase_core::presentation::{NoOpCallback, Presentation};
use showcase_types::INVALID_JSON_MESSAGE;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn serve(state: AppState) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve_listener(listener, Arc::new(state)));
    addr
}

async fn connect(addr: SocketAddr, path: &str) -> Socket {
    let (socket, _) = connect_async(format!("ws://{addr}{path}")).await.unwrap();
    socket
}

async fn send_text(socket: &mut Socket, text: &str) {
    socket.send(Message::Text(text.into())).await.unwrap();
}

/// Next text frame, skipping control frames.
async fn next_text(socket: &mut Socket) -> String {
    loop {
        let frame = tokio::time::timeout(WAIT, socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        match frame {
            Message::Text(text) => return text.as_str().to_owned(),
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

async fn next_json(socket: &mut Socket) -> Value {
    serde_json::from_str(&next_text(socket).await).unwrap()
}

/// Ping and wait for the pong so the server side is known to be live.
async fn handshake(socket: &mut Socket) {
    send_text(socket, r#"{"type":"ping"}"#).await;
    let reply = next_json(socket).await;
    assert_eq!(reply["type"], "pong");
}

async fn next_event(events: &mut broadcast::Receiver<ClientEvent>) -> ClientEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .unwrap()
        .unwrap()
}

// =========================================================================
// /ws
// =========================================================================

#[tokio::test]
async fn ping_gets_pong_with_timestamp() {
    let addr = serve(AppState::new()).await;
    let mut socket = connect(addr, "/ws").await;

    send_text(&mut socket, r#"{"type":"ping"}"#).await;
    let reply = next_json(&mut socket).await;

    assert_eq!(reply["type"], "pong");
    assert!(reply["timestamp"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn invalid_json_gets_error_and_stays_open() {
    let addr = serve(AppState::new()).await;
    let mut socket = connect(addr, "/ws").await;

    send_text(&mut socket, "not json").await;
    let reply = next_json(&mut socket).await;
    assert_eq!(reply, json!({"type": "error", "message": INVALID_JSON_MESSAGE}));

    // The connection survives the bad frame.
    handshake(&mut socket).await;
}

#[tokio::test]
async fn other_json_is_echoed_back() {
    let addr = serve(AppState::new()).await;
    let mut socket = connect(addr, "/ws").await;

    send_text(&mut socket, r#"{"type":"hello","n":3}"#).await;
    let reply = next_json(&mut socket).await;

    assert_eq!(reply["type"], "echo");
    assert_eq!(reply["originalMessage"], json!({"type": "hello", "n": 3}));
    assert!(reply["timestamp"].is_i64());
}

#[tokio::test]
async fn broadcast_reaches_others_but_not_sender() {
    let addr = serve(AppState::new()).await;
    let mut sender = connect(addr, "/ws").await;
    let mut receiver = connect(addr, "/ws").await;
    handshake(&mut sender).await;
    handshake(&mut receiver).await;

    let frame = r#"{"type":"broadcast","text":"hi all"}"#;
    send_text(&mut sender, frame).await;

    assert_eq!(next_text(&mut receiver).await, frame);

    // The sender's next reply is its own pong, not the broadcast.
    handshake(&mut sender).await;
}

// =========================================================================
// /ws/raw
// =========================================================================

#[tokio::test]
async fn raw_echo_returns_frames_unchanged() {
    let addr = serve(AppState::new()).await;
    let mut socket = connect(addr, "/ws/raw").await;

    send_text(&mut socket, "not json at all").await;
    assert_eq!(next_text(&mut socket).await, "not json at all");

    socket
        .send(Message::Binary(vec![1_u8, 2, 3].into()))
        .await
        .unwrap();
    let frame = tokio::time::timeout(WAIT, socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(frame, Message::Binary(vec![1_u8, 2, 3].into()));
}

// =========================================================================
// /ws/presentation
// =========================================================================

#[tokio::test]
async fn presentation_stream_sends_snapshots() {
    let (handle, _task) = Presentation::spawn(&ShowcaseConfig::default(), NoOpCallback).unwrap();
    let addr = serve(AppState::with_presentation(handle.clone())).await;
    let mut socket = connect(addr, "/ws/presentation").await;

    let first = next_json(&mut socket).await;
    assert_eq!(first["stage_count"], 5);

    handle.pause().await.unwrap();
    loop {
        let snapshot = next_json(&mut socket).await;
        if snapshot["is_paused"] == true {
            break;
        }
    }
}

#[tokio::test]
async fn presentation_stream_without_runner_is_refused() {
    let addr = serve(AppState::new()).await;
    let result = connect_async(format!("ws://{addr}/ws/presentation")).await;
    assert!(result.is_err());
}

// =========================================================================
// EchoClient
// =========================================================================

#[tokio::test]
async fn client_connects_and_receives_pong() {
    let addr = serve(AppState::new()).await;
    let (client, mut events) =
        EchoClient::spawn(format!("ws://{addr}/ws"), ReconnectPolicy::default());

    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);
    assert!(client.is_connected());

    client.send(&json!({"type": "ping"})).await.unwrap();
    match next_event(&mut events).await {
        ClientEvent::Message(value) => assert_eq!(value["type"], "pong"),
        other => panic!("expected pong, got {other:?}"),
    }

    client.close();
}

#[tokio::test]
async fn client_gives_up_after_max_attempts() {
    // Bind then drop to get a port with nothing listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let policy = ReconnectPolicy {
        max_attempts: 2,
        step: Duration::from_millis(5),
        max_delay: Duration::from_millis(10),
    };
    let (client, mut events) = EchoClient::spawn(format!("ws://{addr}/ws"), policy);

    let mut errors = 0;
    loop {
        match next_event(&mut events).await {
            ClientEvent::Error(_) => errors += 1,
            ClientEvent::Unavailable => break,
            other => panic!("unexpected event: {other:?}"),
        }
    }

    // One initial attempt plus two retries.
    assert_eq!(errors, 3);
    assert!(!client.is_connected());
    assert!(client.send(&json!({"type": "ping"})).await.is_err());
}
