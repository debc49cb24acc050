//! End-to-end tests against a relay server bound to a loopback port.

#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

use hearth_realtime::app::build_app;
use hearth_realtime::app_state::AppState;
use hearth_realtime::client::{ConnectionState, RealtimeClient};
use hearth_realtime::config::ClientConfig;
use hearth_realtime::domain::{ChatMessage, Envelope, RelayBus, UserId};

const WAIT: Duration = Duration::from_secs(5);

fn state(auth_timeout: Duration) -> AppState {
    AppState {
        bus: RelayBus::new(64),
        auth_timeout,
    }
}

async fn spawn_server(auth_timeout: Duration) -> SocketAddr {
    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    let app = build_app(state(auth_timeout));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

fn user(id: &str) -> UserId {
    let Ok(user) = UserId::new(id) else {
        panic!("expected valid id");
    };
    user
}

async fn client_for(addr: SocketAddr, id: &str) -> (RealtimeClient, mpsc::UnboundedReceiver<Envelope>) {
    let config = ClientConfig::for_origin(format!("http://{addr}"));
    let Ok(client) = RealtimeClient::new(&config) else {
        panic!("client should build");
    };
    let (tx, rx) = mpsc::unbounded_channel();
    let _handle = client.on_message(move |envelope| {
        let _ = tx.send(envelope.clone());
        Ok(())
    });
    tokio_test::assert_ok!(client.connect(id));
    let waited = tokio::time::timeout(WAIT, client.wait_for_state(ConnectionState::Connected)).await;
    assert!(matches!(waited, Ok(Ok(_))), "{id} never connected");
    (client, rx)
}

async fn health(addr: SocketAddr) -> Value {
    let Ok(response) = reqwest::get(format!("http://{addr}/health")).await else {
        panic!("health request failed");
    };
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let Ok(body) = response.json::<Value>().await else {
        panic!("health body is not json");
    };
    body
}

/// Waits until the server reports `count` authenticated sessions.
async fn await_sessions(addr: SocketAddr, count: u64) {
    let reached = tokio::time::timeout(WAIT, async {
        loop {
            if health(addr).await.get("connections") == Some(&json!(count)) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "server never saw {count} sessions");
}

async fn next_envelope(rx: &mut mpsc::UnboundedReceiver<Envelope>) -> Envelope {
    let Ok(Some(envelope)) = tokio::time::timeout(WAIT, rx.recv()).await else {
        panic!("no envelope delivered");
    };
    envelope
}

async fn next_text<S>(ws: &mut S) -> Value
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let Ok(Some(Ok(msg))) = tokio::time::timeout(WAIT, ws.next()).await else {
        panic!("no frame from server");
    };
    let Ok(text) = msg.to_text() else {
        panic!("expected a text frame, got {msg:?}");
    };
    let Ok(value) = serde_json::from_str(text) else {
        panic!("server sent invalid json: {text}");
    };
    value
}

#[tokio::test]
async fn message_reaches_only_its_recipient() {
    let addr = spawn_server(Duration::from_secs(10)).await;
    let (alice, _alice_rx) = client_for(addr, "alice").await;
    let (_bob, mut bob_rx) = client_for(addr, "bob").await;
    let (_carol, mut carol_rx) = client_for(addr, "carol").await;
    await_sessions(addr, 3).await;

    let mut message = ChatMessage::new(user("bob"), "hi bob");
    message.sender_id = Some(user("mallory"));
    alice.send_message(&message);

    let got = next_envelope(&mut bob_rx).await;
    assert_eq!(got.kind(), "message");
    assert_eq!(got.field("senderId"), Some(&json!("alice")));
    assert_eq!(got.field("recipientId"), Some(&json!("bob")));
    assert_eq!(got.field("content"), Some(&json!("hi bob")));
    assert!(got.field("sentAt").is_some());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(carol_rx.try_recv().is_err());
}

#[tokio::test]
async fn disconnect_releases_the_server_session() {
    let addr = spawn_server(Duration::from_secs(10)).await;
    let (alice, _rx) = client_for(addr, "alice").await;
    await_sessions(addr, 1).await;

    alice.disconnect().await;
    assert_eq!(alice.state(), ConnectionState::Disconnected);
    await_sessions(addr, 0).await;
}

#[tokio::test]
async fn frames_before_auth_are_rejected() {
    let addr = spawn_server(Duration::from_secs(10)).await;
    let Ok((mut ws, _)) = connect_async(format!("ws://{addr}/ws")).await else {
        panic!("ws connect failed");
    };

    let early = json!({"type": "message", "recipientId": "bob", "content": "x"});
    tokio_test::assert_ok!(ws.send(Message::text(early.to_string())).await);
    let reply = next_text(&mut ws).await;
    assert_eq!(reply.get("type"), Some(&json!("error")));
    assert_eq!(reply.get("code"), Some(&json!(401)));

    tokio_test::assert_ok!(ws.send(Message::text(r#"{"type":"auth","userId":"bob"}"#)).await);
    tokio_test::assert_ok!(ws.send(Message::text(r#"{"type":"auth","userId":"bob"}"#)).await);
    let reply = next_text(&mut ws).await;
    assert_eq!(reply.get("code"), Some(&json!(409)));

    tokio_test::assert_ok!(ws.send(Message::text(r#"{"type":"bogus"}"#)).await);
    let reply = next_text(&mut ws).await;
    assert_eq!(reply.get("code"), Some(&json!(404)));
}

#[tokio::test]
async fn silent_socket_is_closed_after_auth_timeout() {
    let addr = spawn_server(Duration::from_millis(150)).await;
    let Ok((mut ws, _)) = connect_async(format!("ws://{addr}/ws")).await else {
        panic!("ws connect failed");
    };

    let reply = next_text(&mut ws).await;
    assert_eq!(reply.get("code"), Some(&json!(401)));

    let closed = tokio::time::timeout(WAIT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "socket stayed open");
}

#[tokio::test]
async fn rest_notification_reaches_connected_user() {
    let addr = spawn_server(Duration::from_secs(10)).await;
    let (_bob, mut bob_rx) = client_for(addr, "bob").await;
    await_sessions(addr, 1).await;

    let Ok(response) = reqwest::Client::new()
        .post(format!("http://{addr}/api/v1/notifications"))
        .json(&json!({"recipientId": "bob", "kind": "follow", "actorId": "alice"}))
        .send()
        .await
    else {
        panic!("publish request failed");
    };
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);

    let got = next_envelope(&mut bob_rx).await;
    assert_eq!(got.kind(), "notification");
    assert_eq!(got.field("kind"), Some(&json!("follow")));
    assert_eq!(got.field("actorId"), Some(&json!("alice")));
    assert!(got.field("createdAt").is_some());
}

#[tokio::test]
async fn publish_notification_returns_accepted() {
    let app = build_app(state(Duration::from_secs(10)));
    let Ok(request) = Request::builder()
        .method("POST")
        .uri("/api/v1/notifications")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"recipientId":"bob","kind":"like"}"#))
    else {
        panic!("request should build");
    };

    let response = app
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {});
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
        panic!("body unreadable");
    };
    let Ok(body) = serde_json::from_slice::<Value>(&bytes) else {
        panic!("body is not json");
    };
    assert_eq!(body.get("accepted"), Some(&json!(true)));
    assert!(body.get("timestamp").is_some());
}

#[tokio::test]
async fn publish_notification_rejects_oversized_text() {
    let app = build_app(state(Duration::from_secs(10)));
    let payload = json!({"recipientId": "bob", "kind": "comment", "text": "x".repeat(2001)});
    let Ok(request) = Request::builder()
        .method("POST")
        .uri("/api/v1/notifications")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
    else {
        panic!("request should build");
    };

    let response = app
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {});
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_version() {
    let addr = spawn_server(Duration::from_secs(10)).await;
    let body = health(addr).await;
    assert_eq!(body.get("status"), Some(&json!("healthy")));
    assert_eq!(body.get("version"), Some(&json!(env!("CARGO_PKG_VERSION"))));
    assert_eq!(body.get("connections"), Some(&json!(0)));
}

#[tokio::test]
async fn health_counts_only_authenticated_sessions() {
    let addr = spawn_server(Duration::from_secs(10)).await;
    let Ok((mut ws, _)) = connect_async(format!("ws://{addr}/ws")).await else {
        panic!("ws connect failed");
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(health(addr).await.get("connections"), Some(&json!(0)));

    tokio_test::assert_ok!(ws.send(Message::text(r#"{"type":"auth","userId":"dana"}"#)).await);
    await_sessions(addr, 1).await;
}
