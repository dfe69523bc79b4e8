//! Notification lifecycle jobs: scheduled dispatch, retries, expiry,
//! archival and stats.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use pharmahub_core::result::AppResult;
use pharmahub_service::{DeliveryStatsService, NotificationStore};

use crate::job::JobHandler;

/// Dispatches notifications whose scheduled time has arrived.
#[derive(Debug)]
pub struct ProcessScheduledJob {
    store: Arc<NotificationStore>,
}

impl ProcessScheduledJob {
    pub fn new(store: Arc<NotificationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl JobHandler for ProcessScheduledJob {
    async fn run(&self) -> AppResult<Value> {
        let report = self.store.process_scheduled().await?;
        Ok(serde_json::to_value(report)?)
    }
}

/// Re-attempts external channels whose retry time has come.
#[derive(Debug)]
pub struct RetryFailedJob {
    store: Arc<NotificationStore>,
}

impl RetryFailedJob {
    pub fn new(store: Arc<NotificationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl JobHandler for RetryFailedJob {
    async fn run(&self) -> AppResult<Value> {
        let report = self.store.dispatcher().retry_failed().await?;
        Ok(serde_json::to_value(report)?)
    }
}

/// Moves expired notifications to the expired state.
#[derive(Debug)]
pub struct CleanupExpiredJob {
    store: Arc<NotificationStore>,
}

impl CleanupExpiredJob {
    pub fn new(store: Arc<NotificationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl JobHandler for CleanupExpiredJob {
    async fn run(&self) -> AppResult<Value> {
        let expired = self.store.sweep_expired().await?;
        Ok(json!({ "expired": expired }))
    }
}

/// Archives read or dismissed notifications past retention.
#[derive(Debug)]
pub struct ArchiveOldJob {
    store: Arc<NotificationStore>,
}

impl ArchiveOldJob {
    pub fn new(store: Arc<NotificationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl JobHandler for ArchiveOldJob {
    async fn run(&self) -> AppResult<Value> {
        let archived = self.store.archive_old().await?;
        Ok(json!({ "archived": archived }))
    }
}

/// Recomputes the delivery stats snapshot.
#[derive(Debug)]
pub struct UpdateStatsJob {
    stats: Arc<DeliveryStatsService>,
}

impl UpdateStatsJob {
    pub fn new(stats: Arc<DeliveryStatsService>) -> Self {
        Self { stats }
    }
}

#[async_trait]
impl JobHandler for UpdateStatsJob {
    async fn run(&self) -> AppResult<Value> {
        let stats = self.stats.refresh().await?;
        Ok(json!({ "total": stats.total }))
    }
}
