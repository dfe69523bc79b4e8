//! PostgreSQL notification repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use pharmahub_core::error::{AppError, ErrorKind};
use pharmahub_core::result::AppResult;
use pharmahub_core::types::{BatchId, NotificationId, PageRequest, UserId, WorkspaceId};
use pharmahub_entity::notification::{
    DeliveryAttempt, DeliveryChannels, Notification, NotificationFilter, NotificationPriority,
    NotificationStats, NotificationStatus, NotificationType, merge_delivery,
};

use super::NotificationRepository;

const COLUMNS: &str = "id, user_id, workspace_id, notification_type, title, content, data, \
    priority, status, delivery_channels, delivery_status, scheduled_for, expires_at, group_key, \
    batch_id, created_by, dispatched_at, read_at, dismissed_at, archived_at, created_at, updated_at";

/// Row shape of the `notifications` table.
#[derive(Debug, FromRow)]
struct NotificationRow {
    id: NotificationId,
    user_id: UserId,
    workspace_id: WorkspaceId,
    notification_type: NotificationType,
    title: String,
    content: String,
    data: serde_json::Value,
    priority: NotificationPriority,
    status: NotificationStatus,
    delivery_channels: Json<DeliveryChannels>,
    delivery_status: Json<Vec<DeliveryAttempt>>,
    scheduled_for: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    group_key: Option<String>,
    batch_id: Option<BatchId>,
    created_by: UserId,
    dispatched_at: Option<DateTime<Utc>>,
    read_at: Option<DateTime<Utc>>,
    dismissed_at: Option<DateTime<Utc>>,
    archived_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            workspace_id: row.workspace_id,
            notification_type: row.notification_type,
            title: row.title,
            content: row.content,
            data: row.data,
            priority: row.priority,
            status: row.status,
            delivery_channels: row.delivery_channels.0,
            delivery_status: row.delivery_status.0,
            scheduled_for: row.scheduled_for,
            expires_at: row.expires_at,
            group_key: row.group_key,
            batch_id: row.batch_id,
            created_by: row.created_by,
            dispatched_at: row.dispatched_at,
            read_at: row.read_at,
            dismissed_at: row.dismissed_at,
            archived_at: row.archived_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn db_err(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::with_source(ErrorKind::Database, context, e)
}

/// Appends the recipient scope and listing filters to a query.
fn push_scope(
    qb: &mut QueryBuilder<'_, Postgres>,
    user_id: UserId,
    workspace_id: WorkspaceId,
    filter: &NotificationFilter,
) {
    qb.push(" WHERE user_id = ").push_bind(user_id);
    qb.push(" AND workspace_id = ").push_bind(workspace_id);
    match filter.status {
        Some(status) => {
            qb.push(" AND status = ").push_bind(status);
        }
        None => {
            qb.push(" AND status <> 'archived'");
        }
    }
    if let Some(kind) = filter.notification_type {
        qb.push(" AND notification_type = ").push_bind(kind);
    }
    if let Some(priority) = filter.priority {
        qb.push(" AND priority = ").push_bind(priority);
    }
    if let Some(from) = filter.from {
        qb.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        qb.push(" AND created_at < ").push_bind(to);
    }
}

/// Notification storage in PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    /// Create a repository over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_many(&self, sql: String, now: DateTime<Utc>, limit: i64) -> AppResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("Failed to load notifications for delivery"))?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn grouped_counts(&self, sql: &str) -> AppResult<Vec<(String, i64)>> {
        sqlx::query_as::<_, (String, i64)>(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("Failed to aggregate notification stats"))
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn insert(&self, n: &Notification) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO notifications (id, user_id, workspace_id, notification_type, title, content, \
             data, priority, status, delivery_channels, delivery_status, scheduled_for, expires_at, \
             group_key, batch_id, created_by, dispatched_at, read_at, dismissed_at, archived_at, \
             created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
             $18, $19, $20, $21, $22)",
        )
        .bind(n.id)
        .bind(n.user_id)
        .bind(n.workspace_id)
        .bind(n.notification_type)
        .bind(&n.title)
        .bind(&n.content)
        .bind(&n.data)
        .bind(n.priority)
        .bind(n.status)
        .bind(Json(&n.delivery_channels))
        .bind(Json(&n.delivery_status))
        .bind(n.scheduled_for)
        .bind(n.expires_at)
        .bind(&n.group_key)
        .bind(n.batch_id)
        .bind(n.created_by)
        .bind(n.dispatched_at)
        .bind(n.read_at)
        .bind(n.dismissed_at)
        .bind(n.archived_at)
        .bind(n.created_at)
        .bind(n.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to insert notification"))?;
        Ok(())
    }

    async fn find_by_id(&self, id: NotificationId) -> AppResult<Option<Notification>> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {COLUMNS} FROM notifications WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to load notification"))?;
        Ok(row.map(Notification::from))
    }

    async fn find_recent_by_group_key(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
        group_key: &str,
        since: DateTime<Utc>,
    ) -> AppResult<Option<Notification>> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {COLUMNS} FROM notifications \
             WHERE user_id = $1 AND workspace_id = $2 AND group_key = $3 AND created_at >= $4 \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(user_id)
        .bind(workspace_id)
        .bind(group_key)
        .bind(since)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to look up notification group"))?;
        Ok(row.map(Notification::from))
    }

    async fn find_for_user(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
        filter: &NotificationFilter,
        page: &PageRequest,
    ) -> AppResult<(Vec<Notification>, u64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM notifications");
        push_scope(&mut count, user_id, workspace_id, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(db_err("Failed to count notifications"))?;

        let mut list = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM notifications"));
        push_scope(&mut list, user_id, workspace_id, filter);
        list.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = list
            .build_query_as::<NotificationRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("Failed to list notifications"))?;

        Ok((
            rows.into_iter().map(Notification::from).collect(),
            total.max(0) as u64,
        ))
    }

    async fn count_unread(&self, user_id: UserId, workspace_id: WorkspaceId) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications \
             WHERE user_id = $1 AND workspace_id = $2 AND status = 'unread'",
        )
        .bind(user_id)
        .bind(workspace_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err("Failed to count unread notifications"))?;
        Ok(count.max(0) as u64)
    }

    async fn find_unread_between(
        &self,
        user_id: UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {COLUMNS} FROM notifications \
             WHERE user_id = $1 AND status = 'unread' AND notification_type <> 'digest' \
             AND created_at >= $2 AND created_at < $3 \
             ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to load digest window"))?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn mark_read(&self, id: NotificationId, now: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET status = 'read', read_at = $2, updated_at = $2 \
             WHERE id = $1 AND status = 'unread'",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to mark notification read"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_many_read(
        &self,
        user_id: UserId,
        ids: &[NotificationId],
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        let ids: Vec<Uuid> = ids.iter().map(|id| id.into_uuid()).collect();
        let result = sqlx::query(
            "UPDATE notifications SET status = 'read', read_at = $3, updated_at = $3 \
             WHERE id = ANY($1) AND user_id = $2 AND status = 'unread'",
        )
        .bind(&ids)
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to mark notifications read"))?;
        Ok(result.rows_affected())
    }

    async fn mark_all_read(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET status = 'read', read_at = $3, updated_at = $3 \
             WHERE user_id = $1 AND workspace_id = $2 AND status = 'unread'",
        )
        .bind(user_id)
        .bind(workspace_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to mark all notifications read"))?;
        Ok(result.rows_affected())
    }

    async fn dismiss(&self, id: NotificationId, now: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET status = 'dismissed', dismissed_at = $2, updated_at = $2 \
             WHERE id = $1 AND status IN ('unread', 'read')",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to dismiss notification"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn save_delivery(
        &self,
        id: NotificationId,
        delivery: &[DeliveryAttempt],
        now: DateTime<Utc>,
    ) -> AppResult<Vec<DeliveryAttempt>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_err("Failed to begin delivery update"))?;

        let current: Option<Json<Vec<DeliveryAttempt>>> = sqlx::query_scalar(
            "SELECT delivery_status FROM notifications WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err("Failed to lock delivery status"))?;
        let Some(Json(mut stored)) = current else {
            return Ok(delivery.to_vec());
        };

        if merge_delivery(&mut stored, delivery) {
            sqlx::query(
                "UPDATE notifications SET delivery_status = $2, updated_at = $3 WHERE id = $1",
            )
            .bind(id)
            .bind(Json(&stored))
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(db_err("Failed to save delivery status"))?;
        }
        tx.commit()
            .await
            .map_err(db_err("Failed to commit delivery update"))?;
        Ok(stored)
    }

    async fn claim_for_dispatch(&self, id: NotificationId, now: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET dispatched_at = $2 WHERE id = $1 AND dispatched_at IS NULL",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to claim notification"))?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_undispatched_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<Notification>> {
        self.fetch_many(
            format!(
                "SELECT {COLUMNS} FROM notifications \
                 WHERE dispatched_at IS NULL \
                 AND (scheduled_for IS NULL OR scheduled_for <= $1) \
                 AND status IN ('unread', 'read') \
                 AND (expires_at IS NULL OR expires_at >= $1) \
                 ORDER BY scheduled_for NULLS FIRST, created_at LIMIT $2"
            ),
            now,
            limit,
        )
        .await
    }

    async fn find_due_deferrals(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<Notification>> {
        self.fetch_many(
            format!(
                "SELECT {COLUMNS} FROM notifications \
                 WHERE dispatched_at IS NOT NULL \
                 AND status IN ('unread', 'read') \
                 AND (expires_at IS NULL OR expires_at >= $1) \
                 AND EXISTS (SELECT 1 FROM jsonb_array_elements(delivery_status) d \
                     WHERE d->>'status' = 'pending' \
                     AND d->>'next_attempt_at' IS NOT NULL \
                     AND (d->>'next_attempt_at')::timestamptz <= $1) \
                 ORDER BY created_at LIMIT $2"
            ),
            now,
            limit,
        )
        .await
    }

    async fn find_retryable(
        &self,
        max_attempts: u32,
        now: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {COLUMNS} FROM notifications \
             WHERE status IN ('unread', 'read') \
             AND (expires_at IS NULL OR expires_at >= $1) \
             AND EXISTS (SELECT 1 FROM jsonb_array_elements(delivery_status) d \
                 WHERE d->>'status' = 'failed' \
                 AND (d->>'attempts')::int < $2 \
                 AND (d->>'next_attempt_at' IS NULL OR (d->>'next_attempt_at')::timestamptz <= $1)) \
             ORDER BY updated_at LIMIT $3"
        ))
        .bind(now)
        .bind(max_attempts as i32)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to load retryable notifications"))?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn archive_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET status = 'archived', archived_at = $1, updated_at = $1 \
             WHERE status <> 'archived' AND expires_at IS NOT NULL AND expires_at < $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to archive expired notifications"))?;
        Ok(result.rows_affected())
    }

    async fn archive_older_than(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET status = 'archived', archived_at = $2, updated_at = $2 \
             WHERE status IN ('read', 'dismissed') AND created_at < $1",
        )
        .bind(cutoff)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to archive old notifications"))?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM notifications \
             WHERE status = 'archived' AND expires_at IS NOT NULL AND expires_at < $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to delete expired notifications"))?;
        Ok(result.rows_affected())
    }

    async fn stats(&self, now: DateTime<Utc>) -> AppResult<NotificationStats> {
        let by_status = self
            .grouped_counts("SELECT status::text, COUNT(*) FROM notifications GROUP BY 1")
            .await?;
        let by_type = self
            .grouped_counts("SELECT notification_type::text, COUNT(*) FROM notifications GROUP BY 1")
            .await?;
        let by_channel_status = self
            .grouped_counts(
                "SELECT (d->>'channel') || ':' || (d->>'status'), COUNT(*) \
                 FROM notifications, jsonb_array_elements(delivery_status) d GROUP BY 1",
            )
            .await?;

        let to_map = |rows: Vec<(String, i64)>| {
            rows.into_iter()
                .map(|(k, v)| (k, v.max(0) as u64))
                .collect()
        };
        let mut stats = NotificationStats {
            by_status: to_map(by_status),
            by_type: to_map(by_type),
            by_channel_status: to_map(by_channel_status),
            computed_at: Some(now),
            ..Default::default()
        };
        stats.total = stats.by_status.values().sum();
        Ok(stats)
    }
}
