//! WebSocket upgrade handler.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::response::Response;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tracing::{info, warn};

use pharmahub_auth::bearer_token;
use pharmahub_core::error::AppError;
use pharmahub_core::types::WorkspaceId;
use pharmahub_entity::user::Identity;
use pharmahub_service::RequestContext;

use crate::error::ApiError;
use crate::state::AppState;

/// Query parameter for WebSocket authentication.
#[derive(Debug, serde::Deserialize)]
pub struct WsQuery {
    /// Bearer token; browsers cannot set headers on the upgrade request.
    #[serde(default)]
    pub token: Option<String>,
}

/// GET /ws?token={jwt}
///
/// The token is verified before the upgrade; a bad token gets a plain 401.
pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Query(query): Query<WsQuery>,
) -> Result<Response, ApiError> {
    let token = query
        .token
        .as_deref()
        .or_else(|| {
            headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(bearer_token)
        })
        .ok_or_else(|| AppError::authentication("Missing access token"))?;

    let identity = state.identity.verify(token).await?;
    let context = RequestContext::new(identity, state.resolver.resolve(&identity).await);
    let workspace_id = context.workspace_id();

    Ok(ws.on_upgrade(move |socket| handle_socket(state, identity, workspace_id, socket)))
}

async fn handle_socket(
    state: AppState,
    identity: Identity,
    workspace_id: Option<WorkspaceId>,
    socket: WebSocket,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let engine = state.realtime.clone();
    let mut shutdown = engine.shutdown_receiver();

    let (handle, mut outbound) = engine.connect(&identity, workspace_id).await;
    let conn_id = handle.id;
    let heartbeat = engine.spawn_heartbeat(Arc::clone(&handle));

    info!(%conn_id, user_id = %identity.user_id, "WebSocket connection established");

    let forward = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
    });

    let check_every = Duration::from_secs(engine.broadcaster().config().ping_interval_seconds.max(1));
    let mut liveness = tokio::time::interval(check_every);

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = liveness.tick() => {
                if !handle.is_alive() {
                    break;
                }
            }
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => engine.handle_inbound(conn_id, text.as_str()).await,
                Some(Ok(Message::Pong(_))) => handle.record_pong(Utc::now()),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(%conn_id, error = %e, "WebSocket error");
                    break;
                }
            },
        }
    }

    heartbeat.abort();
    engine.disconnect(conn_id);
    drop(handle);
    let forward_abort = forward.abort_handle();
    if tokio::time::timeout(Duration::from_secs(1), forward).await.is_err() {
        warn!(%conn_id, "Outbound forwarder did not finish");
        forward_abort.abort();
    }

    info!(%conn_id, user_id = %identity.user_id, "WebSocket connection closed");
}
