//! Admin, job and health endpoint integration tests.

mod helpers;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;

use helpers::{TestApp, channel_status, test_config};
use pharmahub_core::types::{UserId, WorkspaceId};
use pharmahub_entity::notification::{Channel, DeliveryChannels, NewNotification, NotificationType};
use pharmahub_entity::user::UserRole;
use pharmahub_service::DeliveryFailure;

fn mention(recipient: UserId, ws: WorkspaceId) -> NewNotification {
    NewNotification::new(
        recipient,
        ws,
        NotificationType::Mention,
        "You were mentioned",
        "Check the methotrexate dosing thread",
        UserId::new(),
    )
}

#[tokio::test]
async fn test_admin_routes_require_platform_admin() {
    let app = TestApp::new();
    let (_, owner) = app.user(WorkspaceId::new(), UserRole::Owner);

    for (method, path) in [
        ("POST", "/admin/notifications/process-scheduled"),
        ("POST", "/admin/notifications/retry-failed"),
        ("DELETE", "/admin/notifications/expired"),
        ("GET", "/admin/notifications/stats"),
        ("GET", "/admin/jobs"),
        ("GET", "/admin/workspace-context/stats"),
    ] {
        let res = app.request(method, path, None, Some(&owner)).await;
        assert_eq!(res.status, StatusCode::FORBIDDEN, "{method} {path}");
    }
}

#[tokio::test]
async fn test_process_scheduled_dispatches_due() {
    let app = TestApp::new();
    let (_, admin) = app.admin();
    let ws = WorkspaceId::new();
    let (recipient, token) = app.user(ws, UserRole::Staff);

    let earlier = Utc::now() - Duration::hours(1);
    let created = app
        .state
        .store
        .create_at(
            mention(recipient.user_id, ws).scheduled_for(earlier + Duration::minutes(30)),
            earlier,
        )
        .await
        .unwrap();
    assert!(created.dispatched_at.is_none());

    let res = app
        .request("POST", "/admin/notifications/process-scheduled", None, Some(&admin))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["status"], "completed");
    assert_eq!(res.data()["summary"]["due"], 1);
    assert_eq!(res.data()["summary"]["dispatched"], 1);

    let again = app
        .request("POST", "/admin/notifications/process-scheduled", None, Some(&admin))
        .await;
    assert_eq!(again.data()["summary"]["due"], 0);

    let res = app
        .request("GET", &format!("/notifications/{}", created.id), None, Some(&token))
        .await;
    assert!(res.data()["dispatched_at"].is_string());
}

#[tokio::test]
async fn test_retry_failed_redelivers() {
    let mut config = test_config();
    config.notification.retry_base_delay_seconds = 0;
    let app = TestApp::with_config(config);
    let (_, admin) = app.admin();
    let ws = WorkspaceId::new();
    let (recipient, token) = app.user(ws, UserRole::Staff);

    app.email
        .push_outcome(Err(DeliveryFailure::transient("smtp 451 try later")));
    let created = app
        .state
        .store
        .create(mention(recipient.user_id, ws).with_channels(DeliveryChannels::from_channels(&[
            Channel::InApp,
            Channel::Email,
        ])))
        .await
        .unwrap();

    let res = app
        .request("GET", &format!("/notifications/{}", created.id), None, Some(&token))
        .await;
    assert_eq!(channel_status(res.data(), "email"), Some("failed"));

    let res = app
        .request("POST", "/admin/notifications/retry-failed", None, Some(&admin))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["summary"]["notifications"], 1);
    assert_eq!(res.data()["summary"]["delivered"], 1);

    let res = app
        .request("GET", &format!("/notifications/{}", created.id), None, Some(&token))
        .await;
    assert_eq!(channel_status(res.data(), "email"), Some("delivered"));
    assert_eq!(app.email.calls(), 2);
}

#[tokio::test]
async fn test_archive_then_delete_expired() {
    let app = TestApp::new();
    let (_, admin) = app.admin();
    let ws = WorkspaceId::new();
    let recipient = UserId::new();
    let store = &app.state.store;

    let long_ago = Utc::now() - Duration::days(200);
    let old = store
        .create_at(mention(recipient, ws), long_ago)
        .await
        .unwrap();
    store.mark_as_read_at(old.id, recipient, long_ago).await.unwrap();

    let res = app
        .request("POST", "/admin/notifications/archive-old", None, Some(&admin))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["summary"]["archived"], 1);

    let yesterday = Utc::now() - Duration::days(1);
    store
        .create_at(
            mention(recipient, ws).expires_at(yesterday + Duration::hours(1)),
            yesterday,
        )
        .await
        .unwrap();

    let res = app
        .request("DELETE", "/admin/notifications/expired", None, Some(&admin))
        .await;
    assert_eq!(res.data()["changed"], 0, "expired but not yet archived");

    let res = app
        .request("POST", "/admin/jobs/cleanup-expired/run", None, Some(&admin))
        .await;
    assert_eq!(res.data()["summary"]["expired"], 1);

    let res = app
        .request("DELETE", "/admin/notifications/expired", None, Some(&admin))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["changed"], 1);
}

#[tokio::test]
async fn test_stats_snapshot() {
    let app = TestApp::new();
    let (_, admin) = app.admin();
    let ws = WorkspaceId::new();
    let store = &app.state.store;
    store.create(mention(UserId::new(), ws)).await.unwrap();
    store.create(mention(UserId::new(), ws)).await.unwrap();

    let res = app
        .request("GET", "/admin/notifications/stats", None, Some(&admin))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["total"], 2);
    assert_eq!(res.data()["by_type"]["mention"], 2);

    store.create(mention(UserId::new(), ws)).await.unwrap();
    let res = app
        .request("POST", "/admin/jobs/update-stats/run", None, Some(&admin))
        .await;
    assert_eq!(res.data()["summary"]["total"], 3);
}

#[tokio::test]
async fn test_job_listing_and_lookup() {
    let app = TestApp::new();
    let (_, admin) = app.admin();

    let res = app.request("GET", "/admin/jobs", None, Some(&admin)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["state"], "stopped");
    let jobs = res.data()["jobs"].as_array().unwrap();
    assert_eq!(jobs.len(), 9);
    assert!(jobs.iter().any(|j| j["id"] == "daily-digest"));

    let res = app
        .request("GET", "/admin/jobs/retry-failed", None, Some(&admin))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["running"], false);

    let res = app
        .request("POST", "/admin/jobs/retry-failed/run", None, Some(&admin))
        .await;
    assert_eq!(res.data()["status"], "completed");

    let res = app
        .request("GET", "/admin/jobs/retry-failed", None, Some(&admin))
        .await;
    assert_eq!(res.data()["runs"], 1);

    let res = app
        .request("POST", "/admin/jobs/no-such-job/run", None, Some(&admin))
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_workspace_context_invalidation() {
    let app = TestApp::new();
    let (_, admin) = app.admin();
    let ws = WorkspaceId::new();
    let (first, first_token) = app.member(ws, UserRole::Pharmacist);
    let (_, second_token) = app.member(ws, UserRole::Staff);

    for token in [&first_token, &second_token] {
        let res = app
            .request("GET", "/notifications/unread-count", None, Some(token))
            .await;
        assert_eq!(res.status, StatusCode::OK);
    }

    let res = app
        .request("GET", "/admin/workspace-context/stats", None, Some(&admin))
        .await;
    assert_eq!(res.data()["entries"], 2);

    let res = app
        .request(
            "POST",
            "/admin/workspace-context/invalidate",
            Some(json!({ "user_id": first.user_id })),
            Some(&admin),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["invalidated"], 1);
    assert_eq!(res.data()["cache"]["entries"], 1);

    let res = app
        .request(
            "POST",
            "/admin/workspace-context/invalidate",
            Some(json!({ "type": "subscription_changed", "workspace_id": ws })),
            Some(&admin),
        )
        .await;
    assert_eq!(res.data()["invalidated"], 1);
    assert_eq!(res.data()["cache"]["entries"], 0);

    let res = app
        .request(
            "POST",
            "/admin/workspace-context/invalidate",
            Some(json!({ "type": "bulk_migration" })),
            Some(&admin),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["invalidated"], 0);
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::new();

    let res = app.request("GET", "/health", None, None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["status"], "ok");

    let res = app.request("GET", "/health/detailed", None, None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["cache"], "ok");
    assert_eq!(res.data()["scheduler"], "stopped");
    assert_eq!(res.data()["ws_connections"], 0);
}
