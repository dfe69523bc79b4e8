//! Route definitions for the PharmaHub notification API.
//!
//! Routes are grouped by domain and share one `AppState`.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::compression::build_compression_layer;
use crate::middleware::cors::build_cors_layer;
use crate::middleware::logging::request_logging;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.server.max_body_bytes;
    let cors = build_cors_layer(&state.config.server.cors);

    Router::new()
        .merge(notification_routes())
        .merge(admin_routes())
        .merge(health_routes())
        .route("/ws", get(handlers::ws::ws_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(build_compression_layer())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum_middleware::from_fn(request_logging))
        .with_state(state)
}

fn notification_routes() -> Router<AppState> {
    use handlers::notification as n;

    Router::new()
        .route("/notifications", post(n::create).get(n::list))
        .route("/notifications/unread-count", get(n::unread_count))
        .route("/notifications/read-bulk", post(n::mark_bulk_read))
        .route("/notifications/read-all", post(n::mark_all_read))
        .route(
            "/notifications/preferences",
            get(n::get_preferences).put(n::update_preferences),
        )
        .route("/notifications/test", post(n::send_test))
        .route("/notifications/{id}", get(n::get))
        .route("/notifications/{id}/read", post(n::mark_read))
        .route("/notifications/{id}/dismiss", post(n::dismiss))
}

fn admin_routes() -> Router<AppState> {
    use handlers::admin::{context, jobs, notifications};

    Router::new()
        .route(
            "/admin/notifications/process-scheduled",
            post(notifications::process_scheduled),
        )
        .route(
            "/admin/notifications/retry-failed",
            post(notifications::retry_failed),
        )
        .route(
            "/admin/notifications/archive-old",
            post(notifications::archive_old),
        )
        .route(
            "/admin/notifications/expired",
            delete(notifications::delete_expired),
        )
        .route("/admin/notifications/stats", get(notifications::stats))
        .route(
            "/admin/workspace-context/invalidate",
            post(context::invalidate),
        )
        .route("/admin/workspace-context/stats", get(context::stats))
        .route("/admin/jobs", get(jobs::list_jobs))
        .route("/admin/jobs/{id}", get(jobs::get_job))
        .route("/admin/jobs/{id}/run", post(jobs::run_job))
}

fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/detailed", get(handlers::health::health_detailed))
}
