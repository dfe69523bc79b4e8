//! Application builder: wires services, router and middleware, and runs
//! the server.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use tokio::sync::watch;
use tracing::{error, info, warn};

use pharmahub_auth::JwtIdentityProvider;
use pharmahub_cache::{CacheManager, WorkspaceContextCache};
use pharmahub_core::config::AppConfig;
use pharmahub_core::error::AppError;
use pharmahub_core::result::AppResult;
use pharmahub_database::Repositories;
use pharmahub_realtime::{RealtimeBroadcaster, RealtimeEngine};
use pharmahub_service::{
    ChannelRegistry, DeliveryDispatcher, DeliveryStatsService, DigestService, NotificationStore,
    PreferenceService, WorkspaceContextResolver,
};
use pharmahub_worker::{JobServices, Scheduler, builtin_jobs};

use crate::router::build_router;
use crate::state::AppState;

/// Build the shared state from configuration and already-connected backends.
///
/// The scheduler is created but not started.
pub fn build_state(
    config: AppConfig,
    repos: Repositories,
    cache: CacheManager,
) -> AppResult<AppState> {
    let channels = ChannelRegistry::from_config(&config.channels)?;
    build_state_with_channels(config, repos, cache, channels)
}

/// [`build_state`] with an explicit set of external channel providers.
pub fn build_state_with_channels(
    config: AppConfig,
    repos: Repositories,
    cache: CacheManager,
    channels: ChannelRegistry,
) -> AppResult<AppState> {
    let preferences = PreferenceService::new(repos.preferences.clone(), cache.clone());
    let broadcaster = Arc::new(RealtimeBroadcaster::new(config.realtime.clone()));

    let dispatcher = Arc::new(DeliveryDispatcher::new(
        repos.notifications.clone(),
        preferences.clone(),
        broadcaster.clone(),
        channels,
        &config.notification,
    ));
    let store = Arc::new(NotificationStore::new(
        repos.notifications.clone(),
        dispatcher,
        cache.clone(),
        config.notification.clone(),
    ));
    let digests = Arc::new(DigestService::new(
        repos.notifications.clone(),
        preferences.clone(),
        store.clone(),
        config.notification.digest_items_per_type,
    ));
    let stats = Arc::new(DeliveryStatsService::new(
        repos.notifications.clone(),
        cache.clone(),
    ));

    let context_cache = Arc::new(WorkspaceContextCache::new(Duration::from_secs(
        config.workspace_context.ttl_seconds,
    )));
    let resolver = Arc::new(WorkspaceContextResolver::new(
        repos.workspaces.clone(),
        context_cache,
    ));

    let services = JobServices {
        store: store.clone(),
        digests,
        stats: stats.clone(),
        resolver: resolver.clone(),
        context_sweep_seconds: config.workspace_context.sweep_interval_seconds,
    };
    let scheduler = Scheduler::with_jobs(cache.clone(), builtin_jobs(&services), &config.worker)?;

    let realtime = RealtimeEngine::new(broadcaster, store.clone(), preferences.clone());

    Ok(AppState {
        identity: Arc::new(JwtIdentityProvider::new(&config.auth)),
        config: Arc::new(config),
        cache,
        resolver,
        store,
        preferences,
        stats,
        scheduler,
        realtime,
        started_at: Instant::now(),
    })
}

/// The complete Axum application with all routes and middleware.
pub fn build_app(state: AppState) -> Router {
    build_router(state)
}

/// Connect backends, start the scheduler and serve until a shutdown signal.
pub async fn run_server(config: AppConfig) -> AppResult<()> {
    info!(
        database = %config.database.provider,
        cache = %config.cache.provider,
        "Starting PharmaHub notification server"
    );

    let repos = Repositories::connect(&config.database).await?;
    let cache = CacheManager::new(&config.cache).await?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let worker_enabled = config.worker.enabled;

    let state = build_state(config, repos, cache)?;
    if worker_enabled {
        state.scheduler.start().await?;
    } else {
        info!("Worker disabled, scheduler not started");
    }

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;
    info!(%addr, "Listening");

    let engine = state.realtime.clone();
    let scheduler = state.scheduler.clone();
    let (signalled_tx, mut signalled_rx) = watch::channel(false);

    let server = axum::serve(listener, build_app(state))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            engine.shutdown();
            let _ = signalled_tx.send(true);
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|e| AppError::internal(format!("Server error: {e}")))?;
        }
        _ = async {
            let _ = signalled_rx.wait_for(|signalled| *signalled).await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(grace_seconds = grace.as_secs(), "Grace period elapsed, forcing shutdown");
        }
    }

    if let Err(e) = scheduler.stop().await {
        error!(error = %e, "Scheduler did not stop cleanly");
    }
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
