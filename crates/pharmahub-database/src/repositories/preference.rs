//! PostgreSQL preference repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use pharmahub_core::error::{AppError, ErrorKind};
use pharmahub_core::result::AppResult;
use pharmahub_core::types::UserId;
use pharmahub_entity::notification::{
    CategoryOptIns, ChannelToggles, DigestFrequency, DigestSettings, NotificationPreferences,
    QuietHours,
};

use super::PreferenceRepository;

#[derive(Debug, FromRow)]
struct PreferenceRow {
    user_id: UserId,
    channels: Json<ChannelToggles>,
    categories: Json<CategoryOptIns>,
    quiet_hours: Json<QuietHours>,
    digest_enabled: bool,
    digest_frequency: String,
    digest_last_sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PreferenceRow> for NotificationPreferences {
    type Error = AppError;

    fn try_from(row: PreferenceRow) -> Result<Self, Self::Error> {
        let frequency = match row.digest_frequency.as_str() {
            "hourly" => DigestFrequency::Hourly,
            "daily" => DigestFrequency::Daily,
            "weekly" => DigestFrequency::Weekly,
            other => {
                return Err(AppError::database(format!(
                    "Stored digest frequency '{other}' is not recognised"
                )));
            }
        };
        Ok(Self {
            user_id: row.user_id,
            channels: row.channels.0,
            categories: row.categories.0,
            quiet_hours: row.quiet_hours.0,
            digest: DigestSettings {
                enabled: row.digest_enabled,
                frequency,
                last_sent_at: row.digest_last_sent_at,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Preference storage in PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgPreferenceRepository {
    pool: PgPool,
}

impl PgPreferenceRepository {
    /// Create a repository over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PreferenceRepository for PgPreferenceRepository {
    async fn find(&self, user_id: UserId) -> AppResult<Option<NotificationPreferences>> {
        let row = sqlx::query_as::<_, PreferenceRow>(
            "SELECT * FROM notification_preferences WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load preferences", e))?;
        row.map(NotificationPreferences::try_from).transpose()
    }

    async fn upsert(&self, p: &NotificationPreferences) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO notification_preferences (user_id, channels, categories, quiet_hours, \
             digest_enabled, digest_frequency, digest_last_sent_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (user_id) DO UPDATE SET channels = EXCLUDED.channels, \
             categories = EXCLUDED.categories, quiet_hours = EXCLUDED.quiet_hours, \
             digest_enabled = EXCLUDED.digest_enabled, digest_frequency = EXCLUDED.digest_frequency, \
             digest_last_sent_at = EXCLUDED.digest_last_sent_at, updated_at = EXCLUDED.updated_at",
        )
        .bind(p.user_id)
        .bind(Json(&p.channels))
        .bind(Json(&p.categories))
        .bind(Json(&p.quiet_hours))
        .bind(p.digest.enabled)
        .bind(p.digest.frequency.as_str())
        .bind(p.digest.last_sent_at)
        .bind(p.created_at)
        .bind(p.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to save preferences", e))?;
        Ok(())
    }

    async fn find_digest_subscribers(
        &self,
        frequency: DigestFrequency,
    ) -> AppResult<Vec<NotificationPreferences>> {
        let rows = sqlx::query_as::<_, PreferenceRow>(
            "SELECT * FROM notification_preferences \
             WHERE digest_enabled AND digest_frequency = $1 ORDER BY user_id",
        )
        .bind(frequency.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to load digest subscribers", e)
        })?;
        rows.into_iter()
            .map(NotificationPreferences::try_from)
            .collect()
    }

    async fn record_digest_sent(
        &self,
        user_id: UserId,
        window_end: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE notification_preferences SET digest_last_sent_at = $2 WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(window_end)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to record digest window", e)
        })?;
        Ok(())
    }
}
