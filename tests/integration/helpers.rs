//! Shared test helpers for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use chrono::Utc;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use pharmahub_api::{AppState, build_app, build_state_with_channels};
use pharmahub_auth::JwtEncoder;
use pharmahub_cache::CacheManager;
use pharmahub_core::config::AppConfig;
use pharmahub_core::types::{UserId, WorkspaceId};
use pharmahub_database::Repositories;
use pharmahub_database::memory::MemoryWorkspaceDirectory;
use pharmahub_entity::notification::Channel;
use pharmahub_entity::user::{Identity, UserRole};
use pharmahub_entity::workspace::Workspace;
use pharmahub_service::{ChannelRegistry, RecordingChannelProvider};

/// In-memory application with a recording email provider.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub directory: Arc<MemoryWorkspaceDirectory>,
    pub email: Arc<RecordingChannelProvider>,
    encoder: JwtEncoder,
}

/// Defaults with a fixed signing secret.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = "integration-test-secret-0123456789".into();
    config
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let directory = Arc::new(MemoryWorkspaceDirectory::new());
        let repos = Repositories::in_memory_with_directory(directory.clone());
        let email = Arc::new(RecordingChannelProvider::new());
        let channels = ChannelRegistry::new().with_provider(Channel::Email, email.clone());
        let encoder = JwtEncoder::new(&config.auth);

        let state = build_state_with_channels(config, repos, CacheManager::in_memory(), channels)
            .expect("Failed to build state");
        let router = build_app(state.clone());

        Self {
            router,
            state,
            directory,
            email,
            encoder,
        }
    }

    pub fn token(&self, identity: &Identity) -> String {
        self.encoder.issue(identity).expect("Failed to issue token")
    }

    /// A fresh user in `workspace` with a token.
    pub fn user(&self, workspace: WorkspaceId, role: UserRole) -> (Identity, String) {
        let identity = Identity::new(UserId::new(), Some(workspace), role);
        let token = self.token(&identity);
        (identity, token)
    }

    /// Like [`Self::user`], also registering workspace membership in the directory.
    pub fn member(&self, workspace: WorkspaceId, role: UserRole) -> (Identity, String) {
        let (identity, token) = self.user(workspace, role);
        self.directory.put_workspace(Workspace {
            id: workspace,
            name: "Riverside Pharmacy".into(),
            owner_id: identity.user_id,
            plan_id: None,
            trial_end_date: None,
            created_at: Utc::now(),
        });
        self.directory.add_member(workspace, identity.user_id);
        (identity, token)
    }

    pub fn admin(&self) -> (Identity, String) {
        let identity = Identity::new(UserId::new(), None, UserRole::SuperAdmin);
        let token = self.token(&identity);
        (identity, token)
    }

    /// Send one request through the router.
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let body_str = body
            .map(|b| serde_json::to_string(&b).expect("Failed to serialize body"))
            .unwrap_or_default();

        let mut req = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "application/json");

        if let Some(token) = token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }

        let req = req
            .body(Body::from(body_str))
            .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("Failed to read body");

        let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse { status, body }
    }

    /// Create a notification for `recipient` as `token`'s holder.
    pub async fn notify(&self, token: &str, recipient: UserId, extra: Value) -> TestResponse {
        let mut body = serde_json::json!({
            "user_id": recipient,
            "type": "mention",
            "title": "You were mentioned",
            "content": "Dr. Okafor mentioned you in the warfarin thread",
        });
        if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
            body.extend(extra.clone());
        }
        self.request("POST", "/notifications", Some(body), Some(token))
            .await
    }
}

/// Response from a test request.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestResponse {
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    pub fn error_code(&self) -> &str {
        self.body["error"]["code"].as_str().unwrap_or_default()
    }
}

/// Status of `channel` in a serialized notification.
pub fn channel_status<'a>(notification: &'a Value, channel: &str) -> Option<&'a str> {
    notification["delivery_status"]
        .as_array()?
        .iter()
        .find(|a| a["channel"] == channel)
        .and_then(|a| a["status"].as_str())
}
