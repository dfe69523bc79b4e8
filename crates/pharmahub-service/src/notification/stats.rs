//! Aggregate delivery counters for operators.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{info, warn};

use pharmahub_cache::{CacheManager, keys};
use pharmahub_core::result::AppResult;
use pharmahub_database::NotificationRepository;
use pharmahub_entity::notification::NotificationStats;

/// Holds the latest stats snapshot.
///
/// The snapshot is recomputed by the `update-stats` job and shared
/// through the cache so every node serves the same numbers.
pub struct DeliveryStatsService {
    repo: Arc<dyn NotificationRepository>,
    cache: CacheManager,
    latest: RwLock<Option<NotificationStats>>,
}

impl DeliveryStatsService {
    /// Creates a new stats service.
    pub fn new(repo: Arc<dyn NotificationRepository>, cache: CacheManager) -> Self {
        Self {
            repo,
            cache,
            latest: RwLock::new(None),
        }
    }

    /// Recompute and publish the snapshot.
    pub async fn refresh(&self) -> AppResult<NotificationStats> {
        self.refresh_at(Utc::now()).await
    }

    /// [`Self::refresh`] with an explicit clock.
    pub async fn refresh_at(&self, now: DateTime<Utc>) -> AppResult<NotificationStats> {
        let stats = self.repo.stats(now).await?;
        if let Err(e) = self.cache.put_json(&keys::stats_snapshot(), &stats).await {
            warn!(error = %e, "Stats snapshot cache write failed");
        }
        *self.latest.write().await = Some(stats.clone());
        info!(
            total = stats.total,
            failed = stats.channel_status_total("failed"),
            bounced = stats.channel_status_total("bounced"),
            "Notification stats updated"
        );
        Ok(stats)
    }

    /// The latest snapshot, computing one if none exists yet.
    pub async fn latest(&self) -> AppResult<NotificationStats> {
        if let Some(stats) = self.latest.read().await.clone() {
            return Ok(stats);
        }
        match self
            .cache
            .get_json::<NotificationStats>(&keys::stats_snapshot())
            .await
        {
            Ok(Some(stats)) => return Ok(stats),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Stats snapshot cache read failed"),
        }
        self.refresh().await
    }
}

impl std::fmt::Debug for DeliveryStatsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryStatsService").finish_non_exhaustive()
    }
}
