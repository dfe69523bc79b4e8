//! Notification API integration tests.

mod helpers;

use axum::http::StatusCode;
use serde_json::json;

use helpers::{TestApp, channel_status};
use pharmahub_core::types::{NotificationId, WorkspaceId};
use pharmahub_entity::user::UserRole;

#[tokio::test]
async fn test_create_and_list() {
    let app = TestApp::new();
    let ws = WorkspaceId::new();
    let (_, sender) = app.user(ws, UserRole::Pharmacist);
    let (recipient, token) = app.user(ws, UserRole::Staff);

    let res = app
        .notify(&sender, recipient.user_id, json!({ "priority": "high" }))
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.data()["type"], "mention");
    assert_eq!(res.data()["status"], "unread");
    assert_eq!(res.data()["workspace_id"], json!(ws));

    let res = app.request("GET", "/notifications", None, Some(&token)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["total"], 1);
    assert_eq!(res.data()["unread_count"], 1);
    assert_eq!(res.data()["items"][0]["title"], "You were mentioned");
}

#[tokio::test]
async fn test_offset_past_end_returns_empty_page() {
    let app = TestApp::new();
    let ws = WorkspaceId::new();
    let (_, sender) = app.user(ws, UserRole::Pharmacist);
    let (recipient, token) = app.user(ws, UserRole::Staff);
    app.notify(&sender, recipient.user_id, json!({})).await;

    let res = app
        .request(
            "GET",
            &format!("/notifications?offset={}", u64::MAX),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["items"].as_array().unwrap().len(), 0);
    assert_eq!(res.data()["total"], 1);
    assert_eq!(res.data()["offset"], i64::MAX);
}

#[tokio::test]
async fn test_unread_count_ignores_list_filters() {
    let app = TestApp::new();
    let ws = WorkspaceId::new();
    let (_, sender) = app.user(ws, UserRole::Pharmacist);
    let (recipient, token) = app.user(ws, UserRole::Staff);

    app.notify(&sender, recipient.user_id, json!({})).await;
    app.notify(
        &sender,
        recipient.user_id,
        json!({ "type": "therapy_update", "title": "Therapy updated" }),
    )
    .await;

    let res = app
        .request("GET", "/notifications?type=therapy_update", None, Some(&token))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["total"], 1);
    assert_eq!(res.data()["unread_count"], 2);
}

#[tokio::test]
async fn test_disabled_email_is_skipped_and_in_app_waits() {
    let app = TestApp::new();
    let ws = WorkspaceId::new();
    let (_, sender) = app.user(ws, UserRole::Pharmacist);
    let (recipient, token) = app.user(ws, UserRole::Staff);

    let res = app
        .request(
            "PUT",
            "/notifications/preferences",
            Some(json!({ "channels": { "in_app": true, "email": false, "sms": false, "push": false } })),
            Some(&token),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["channels"]["email"], false);

    let res = app
        .notify(
            &sender,
            recipient.user_id,
            json!({ "delivery_channels": { "in_app": true, "email": true } }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(channel_status(res.data(), "in_app"), Some("pending"));
    assert_eq!(channel_status(res.data(), "email"), Some("skipped"));
    assert_eq!(app.email.calls(), 0);
}

#[tokio::test]
async fn test_email_goes_through_provider() {
    let app = TestApp::new();
    let ws = WorkspaceId::new();
    let (_, sender) = app.user(ws, UserRole::Pharmacist);
    let (recipient, _) = app.user(ws, UserRole::Staff);

    let res = app
        .notify(
            &sender,
            recipient.user_id,
            json!({ "type": "patient_query", "title": "New patient query" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(channel_status(res.data(), "email"), Some("delivered"));

    let sent = app.email.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].user_id, recipient.user_id);
    assert_eq!(sent[0].title, "New patient query");
}

#[tokio::test]
async fn test_mark_read_is_idempotent() {
    let app = TestApp::new();
    let ws = WorkspaceId::new();
    let (_, sender) = app.user(ws, UserRole::Pharmacist);
    let (recipient, token) = app.user(ws, UserRole::Staff);

    let created = app.notify(&sender, recipient.user_id, json!({})).await;
    let id = created.data()["id"].as_str().unwrap().to_string();
    let path = format!("/notifications/{id}/read");

    let first = app.request("POST", &path, None, Some(&token)).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.data()["changed"], true);
    assert_eq!(first.data()["unread_count"], 0);

    let second = app.request("POST", &path, None, Some(&token)).await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.data()["changed"], false);

    let res = app
        .request("GET", &format!("/notifications/{id}"), None, Some(&token))
        .await;
    assert_eq!(res.data()["status"], "read");
    assert!(res.data()["read_at"].is_string());
}

#[tokio::test]
async fn test_access_errors() {
    let app = TestApp::new();
    let ws = WorkspaceId::new();
    let (_, sender) = app.user(ws, UserRole::Pharmacist);
    let (recipient, _) = app.user(ws, UserRole::Staff);
    let (_, stranger) = app.user(ws, UserRole::Staff);

    let created = app.notify(&sender, recipient.user_id, json!({})).await;
    let id = created.data()["id"].as_str().unwrap().to_string();

    let res = app
        .request("POST", &format!("/notifications/{id}/read"), None, Some(&stranger))
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.error_code(), "AUTHORIZATION");

    let missing = NotificationId::new();
    let res = app
        .request("GET", &format!("/notifications/{missing}"), None, Some(&stranger))
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.error_code(), "NOT_FOUND");

    let res = app
        .request("GET", "/notifications/not-a-uuid", None, Some(&stranger))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error_code(), "VALIDATION");

    let res = app.request("GET", "/notifications", None, None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.error_code(), "AUTHENTICATION");

    let res = app
        .request("GET", "/notifications", None, Some("garbage.token.value"))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bulk_and_all_read() {
    let app = TestApp::new();
    let ws = WorkspaceId::new();
    let (_, sender) = app.user(ws, UserRole::Pharmacist);
    let (recipient, token) = app.user(ws, UserRole::Staff);

    let mut ids = Vec::new();
    for i in 0..4 {
        let res = app
            .notify(
                &sender,
                recipient.user_id,
                json!({ "title": format!("Mention {i}") }),
            )
            .await;
        ids.push(res.data()["id"].clone());
    }

    let res = app
        .request(
            "POST",
            "/notifications/read-bulk",
            Some(json!({ "notification_ids": [ids[0], ids[1]] })),
            Some(&token),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["changed"], 2);

    let res = app
        .request("GET", "/notifications/unread-count", None, Some(&token))
        .await;
    assert_eq!(res.data()["count"], 2);
    assert_eq!(res.data()["workspace_id"], json!(ws));

    let res = app
        .request("POST", "/notifications/read-all", None, Some(&token))
        .await;
    assert_eq!(res.data()["changed"], 2);

    let res = app
        .request("GET", "/notifications/unread-count", None, Some(&token))
        .await;
    assert_eq!(res.data()["count"], 0);

    let res = app
        .request(
            "POST",
            "/notifications/read-bulk",
            Some(json!({ "notification_ids": [] })),
            Some(&token),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_dismiss_removes_from_unread() {
    let app = TestApp::new();
    let ws = WorkspaceId::new();
    let (_, sender) = app.user(ws, UserRole::Pharmacist);
    let (recipient, token) = app.user(ws, UserRole::Staff);

    let created = app.notify(&sender, recipient.user_id, json!({})).await;
    let id = created.data()["id"].as_str().unwrap().to_string();

    let res = app
        .request("POST", &format!("/notifications/{id}/dismiss"), None, Some(&token))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["status"], "dismissed");

    let res = app
        .request("GET", "/notifications/unread-count", None, Some(&token))
        .await;
    assert_eq!(res.data()["count"], 0);
}

#[tokio::test]
async fn test_preferences_round_trip() {
    let app = TestApp::new();
    let (_, token) = app.user(WorkspaceId::new(), UserRole::Staff);

    let res = app
        .request("GET", "/notifications/preferences", None, Some(&token))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["channels"]["in_app"], true);
    assert_eq!(res.data()["channels"]["sms"], false);

    let res = app
        .request(
            "PUT",
            "/notifications/preferences",
            Some(json!({ "digest_enabled": true, "digest_frequency": "weekly" })),
            Some(&token),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["digest"]["enabled"], true);
    assert_eq!(res.data()["digest"]["frequency"], "weekly");
    assert_eq!(res.data()["channels"]["email"], true, "untouched section kept");

    let res = app
        .request(
            "PUT",
            "/notifications/preferences",
            Some(json!({ "telepathy": true })),
            Some(&token),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_send_test_notification() {
    let app = TestApp::new();
    let (identity, token) = app.user(WorkspaceId::new(), UserRole::Staff);

    let res = app
        .request("POST", "/notifications/test", None, Some(&token))
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.data()["type"], "system_announcement");
    assert_eq!(res.data()["data"]["test"], true);
    assert_eq!(channel_status(res.data(), "sms"), Some("skipped"));

    let sent = app.email.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].user_id, identity.user_id);
}

#[tokio::test]
async fn test_create_validation() {
    let app = TestApp::new();
    let ws = WorkspaceId::new();
    let (_, sender) = app.user(ws, UserRole::Pharmacist);
    let (recipient, _) = app.user(ws, UserRole::Staff);

    let res = app
        .notify(&sender, recipient.user_id, json!({ "type": "digest" }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .notify(&sender, recipient.user_id, json!({ "title": "" }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error_code(), "VALIDATION");

    let res = app
        .notify(
            &sender,
            recipient.user_id,
            json!({ "workspace_id": WorkspaceId::new() }),
        )
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app
        .notify(&sender, recipient.user_id, json!({ "colour": "red" }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_group_key_collapses_duplicates() {
    let app = TestApp::new();
    let ws = WorkspaceId::new();
    let (_, sender) = app.user(ws, UserRole::Pharmacist);
    let (recipient, token) = app.user(ws, UserRole::Staff);

    let first = app
        .notify(&sender, recipient.user_id, json!({ "group_key": "thread-42" }))
        .await;
    let second = app
        .notify(&sender, recipient.user_id, json!({ "group_key": "thread-42" }))
        .await;
    assert_eq!(first.data()["id"], second.data()["id"]);

    let res = app.request("GET", "/notifications", None, Some(&token)).await;
    assert_eq!(res.data()["total"], 1);
}
