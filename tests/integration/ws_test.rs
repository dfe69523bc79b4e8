//! WebSocket integration tests against a live listener.

mod helpers;

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use helpers::TestApp;
use pharmahub_core::types::WorkspaceId;
use pharmahub_entity::user::UserRole;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve(app: &TestApp) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to read address");
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });
    addr
}

async fn connect(addr: SocketAddr, token: &str) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}/ws?token={token}"))
        .await
        .expect("Failed to connect");
    client
}

/// Read frames until one named `event` arrives.
async fn next_event(client: &mut Client, event: &str) -> Value {
    let wait = async {
        loop {
            let frame = client
                .next()
                .await
                .expect("Stream ended")
                .expect("Read failed");
            let Message::Text(text) = frame else {
                continue;
            };
            let value: Value = serde_json::from_str(text.as_str()).expect("Invalid frame");
            if value["event"] == event {
                return value["data"].clone();
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .unwrap_or_else(|_| panic!("Timed out waiting for {event}"))
}

/// Events received within `window`, by name.
async fn drain(client: &mut Client, window: Duration) -> Vec<String> {
    let mut names = Vec::new();
    let _ = tokio::time::timeout(window, async {
        while let Some(Ok(frame)) = client.next().await {
            if let Message::Text(text) = frame
                && let Ok(value) = serde_json::from_str::<Value>(text.as_str())
                && let Some(name) = value["event"].as_str()
            {
                names.push(name.to_string());
            }
        }
    })
    .await;
    names
}

#[tokio::test]
async fn test_connect_receives_initial_state() {
    let app = TestApp::new();
    let ws = WorkspaceId::new();
    let (_, sender) = app.user(ws, UserRole::Pharmacist);
    let (recipient, token) = app.user(ws, UserRole::Staff);
    app.notify(&sender, recipient.user_id, json!({})).await;

    let addr = serve(&app).await;
    let mut client = connect(addr, &token).await;

    let count = next_event(&mut client, "notification:unread_count").await;
    assert_eq!(count["count"], 1);
    assert_eq!(count["workspace_id"], json!(ws));

    let sync = next_event(&mut client, "notification:initial_sync").await;
    assert_eq!(sync["unread_count"], 1);
    assert_eq!(sync["notifications"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_live_delivery_and_read_over_socket() {
    let app = TestApp::new();
    let ws = WorkspaceId::new();
    let (_, sender) = app.user(ws, UserRole::Pharmacist);
    let (recipient, token) = app.user(ws, UserRole::Staff);

    let addr = serve(&app).await;
    let mut client = connect(addr, &token).await;
    next_event(&mut client, "notification:initial_sync").await;

    let created = app.notify(&sender, recipient.user_id, json!({})).await;
    assert_eq!(
        helpers::channel_status(created.data(), "in_app"),
        Some("sent")
    );

    let received = next_event(&mut client, "notification:received").await;
    assert_eq!(received["id"], created.data()["id"]);

    let frame = json!({
        "event": "notification:marked_read",
        "data": { "notification_id": received["id"] },
    });
    client
        .send(Message::Text(frame.to_string().into()))
        .await
        .expect("Send failed");

    let marked = next_event(&mut client, "notification:marked_read").await;
    assert_eq!(marked["notification_id"], received["id"]);
    assert_eq!(marked["unread_count"], 0);

    let res = app
        .request("GET", "/notifications/unread-count", None, Some(&token))
        .await;
    assert_eq!(res.data()["count"], 0);
}

#[tokio::test]
async fn test_http_read_is_echoed_to_socket() {
    let app = TestApp::new();
    let ws = WorkspaceId::new();
    let (_, sender) = app.user(ws, UserRole::Pharmacist);
    let (recipient, token) = app.user(ws, UserRole::Staff);
    let created = app.notify(&sender, recipient.user_id, json!({})).await;
    let id = created.data()["id"].as_str().unwrap().to_string();

    let addr = serve(&app).await;
    let mut client = connect(addr, &token).await;
    next_event(&mut client, "notification:initial_sync").await;

    app.request("POST", &format!("/notifications/{id}/read"), None, Some(&token))
        .await;

    let marked = next_event(&mut client, "notification:marked_read").await;
    assert_eq!(marked["notification_id"], json!(id));
}

#[tokio::test]
async fn test_other_users_see_nothing() {
    let app = TestApp::new();
    let ws = WorkspaceId::new();
    let other_ws = WorkspaceId::new();
    let (_, sender) = app.user(ws, UserRole::Pharmacist);
    let (recipient, recipient_token) = app.user(ws, UserRole::Staff);
    let (_, colleague_token) = app.user(ws, UserRole::Staff);
    let (_, outsider_token) = app.user(other_ws, UserRole::Staff);

    let addr = serve(&app).await;
    let mut recipient_ws = connect(addr, &recipient_token).await;
    let mut colleague_ws = connect(addr, &colleague_token).await;
    let mut outsider_ws = connect(addr, &outsider_token).await;
    for client in [&mut recipient_ws, &mut colleague_ws, &mut outsider_ws] {
        next_event(client, "notification:initial_sync").await;
    }

    app.notify(&sender, recipient.user_id, json!({})).await;
    next_event(&mut recipient_ws, "notification:received").await;

    for client in [&mut colleague_ws, &mut outsider_ws] {
        let events = drain(client, Duration::from_millis(300)).await;
        assert!(
            !events.iter().any(|e| e.starts_with("notification:")),
            "unexpected events {events:?}"
        );
    }
}

#[tokio::test]
async fn test_invalid_frame_gets_error_reply() {
    let app = TestApp::new();
    let (_, token) = app.user(WorkspaceId::new(), UserRole::Staff);

    let addr = serve(&app).await;
    let mut client = connect(addr, &token).await;
    next_event(&mut client, "notification:initial_sync").await;

    client
        .send(Message::Text(r#"{"event":"notification:explode"}"#.into()))
        .await
        .expect("Send failed");
    let error = next_event(&mut client, "error").await;
    assert_eq!(error["code"], "INVALID_MESSAGE");
}

#[tokio::test]
async fn test_bad_token_is_rejected_before_upgrade() {
    let app = TestApp::new();
    let addr = serve(&app).await;

    for url in [
        format!("ws://{addr}/ws?token=not-a-jwt"),
        format!("ws://{addr}/ws"),
    ] {
        let err = connect_async(url.as_str())
            .await
            .err()
            .expect("Handshake should fail");
        match err {
            tungstenite::Error::Http(response) => assert_eq!(response.status(), 401),
            other => panic!("expected HTTP 401, got {other}"),
        }
    }
}
