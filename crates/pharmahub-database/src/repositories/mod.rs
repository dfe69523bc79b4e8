//! Repository traits and the backend factory.
//!
//! Services depend on the traits only. [`Repositories::connect`] picks the
//! backend named by `database.provider`.

pub mod notification;
pub mod preference;
pub mod workspace;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use pharmahub_core::config::DatabaseConfig;
use pharmahub_core::error::AppError;
use pharmahub_core::result::AppResult;
use pharmahub_core::types::{NotificationId, PageRequest, PlanId, UserId, WorkspaceId};
use pharmahub_entity::notification::{
    DeliveryAttempt, DigestFrequency, Notification, NotificationFilter, NotificationPreferences,
    NotificationStats,
};
use pharmahub_entity::workspace::{Plan, Subscription, Workspace};

use crate::connection::DatabasePool;
use crate::memory::{MemoryNotificationRepository, MemoryPreferenceRepository, MemoryWorkspaceDirectory};
use crate::migration::run_migrations;

pub use notification::PgNotificationRepository;
pub use preference::PgPreferenceRepository;
pub use workspace::PgWorkspaceDirectory;

/// Durable notification storage.
///
/// Every method that changes `status` only moves it forward and reports
/// whether (or how many) rows actually changed.
#[async_trait]
pub trait NotificationRepository: Send + Sync + 'static {
    /// Persist a new notification.
    async fn insert(&self, notification: &Notification) -> AppResult<()>;

    /// Load one notification.
    async fn find_by_id(&self, id: NotificationId) -> AppResult<Option<Notification>>;

    /// Newest notification for the same recipient and group key created at or after `since`.
    async fn find_recent_by_group_key(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
        group_key: &str,
        since: DateTime<Utc>,
    ) -> AppResult<Option<Notification>>;

    /// One page of a user's notifications, newest first, plus the filtered total.
    async fn find_for_user(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
        filter: &NotificationFilter,
        page: &PageRequest,
    ) -> AppResult<(Vec<Notification>, u64)>;

    /// Unread count, ignoring any listing filter.
    async fn count_unread(&self, user_id: UserId, workspace_id: WorkspaceId) -> AppResult<u64>;

    /// Unread notifications created in `[from, to)` across the user's workspaces, digests excluded.
    async fn find_unread_between(
        &self,
        user_id: UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Notification>>;

    /// Set `unread -> read`. Returns false if it was not unread.
    async fn mark_read(&self, id: NotificationId, now: DateTime<Utc>) -> AppResult<bool>;

    /// Mark the listed notifications owned by `user_id` as read.
    async fn mark_many_read(
        &self,
        user_id: UserId,
        ids: &[NotificationId],
        now: DateTime<Utc>,
    ) -> AppResult<u64>;

    /// Mark every unread notification of the user in the workspace as read.
    async fn mark_all_read(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
        now: DateTime<Utc>,
    ) -> AppResult<u64>;

    /// Set `unread|read -> dismissed`. Returns false if already dismissed or archived.
    async fn dismiss(&self, id: NotificationId, now: DateTime<Utc>) -> AppResult<bool>;

    /// Merge per-channel delivery records into the stored ones and return
    /// the result. A stored terminal record is never replaced and `attempts`
    /// never decreases. Leaves `status` untouched.
    async fn save_delivery(
        &self,
        id: NotificationId,
        delivery: &[DeliveryAttempt],
        now: DateTime<Utc>,
    ) -> AppResult<Vec<DeliveryAttempt>>;

    /// Atomically set `dispatched_at` if still unset. Exactly one caller wins.
    async fn claim_for_dispatch(&self, id: NotificationId, now: DateTime<Utc>) -> AppResult<bool>;

    /// Undispatched, live notifications whose `scheduled_for` has passed.
    async fn find_undispatched_due(&self, now: DateTime<Utc>, limit: i64)
    -> AppResult<Vec<Notification>>;

    /// Live notifications with a quiet-hours deferral that has come due.
    async fn find_due_deferrals(&self, now: DateTime<Utc>, limit: i64)
    -> AppResult<Vec<Notification>>;

    /// Live notifications with a failed channel under the cap and past its backoff.
    async fn find_retryable(
        &self,
        max_attempts: u32,
        now: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<Notification>>;

    /// Archive notifications whose `expires_at` has passed.
    async fn archive_expired(&self, now: DateTime<Utc>) -> AppResult<u64>;

    /// Archive read or dismissed notifications created before `cutoff`.
    async fn archive_older_than(&self, cutoff: DateTime<Utc>, now: DateTime<Utc>)
    -> AppResult<u64>;

    /// Hard-delete archived notifications whose `expires_at` has passed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64>;

    /// Aggregate counters over the whole table.
    async fn stats(&self, now: DateTime<Utc>) -> AppResult<NotificationStats>;
}

/// Per-user preference storage.
#[async_trait]
pub trait PreferenceRepository: Send + Sync + 'static {
    /// Stored preferences, if the user has any.
    async fn find(&self, user_id: UserId) -> AppResult<Option<NotificationPreferences>>;

    /// Insert or replace.
    async fn upsert(&self, preferences: &NotificationPreferences) -> AppResult<()>;

    /// Users with digests enabled at `frequency`.
    async fn find_digest_subscribers(
        &self,
        frequency: DigestFrequency,
    ) -> AppResult<Vec<NotificationPreferences>>;

    /// Record the end of the last digest window sent to the user.
    async fn record_digest_sent(&self, user_id: UserId, window_end: DateTime<Utc>)
    -> AppResult<()>;
}

/// Read-only view of workspaces, memberships, subscriptions and plans.
#[async_trait]
pub trait WorkspaceDirectory: Send + Sync + 'static {
    /// The workspace the user owns, else the first one they are a member of.
    async fn find_workspace_for_user(&self, user_id: UserId) -> AppResult<Option<Workspace>>;

    /// The workspace's most recent subscription.
    async fn find_subscription(&self, workspace_id: WorkspaceId)
    -> AppResult<Option<Subscription>>;

    /// Load a plan.
    async fn find_plan(&self, plan_id: PlanId) -> AppResult<Option<Plan>>;

    /// Owner and members of the workspace.
    async fn find_member_ids(&self, workspace_id: WorkspaceId) -> AppResult<Vec<UserId>>;
}

/// The repositories a running node needs.
#[derive(Clone)]
pub struct Repositories {
    /// Notification storage.
    pub notifications: Arc<dyn NotificationRepository>,
    /// Preference storage.
    pub preferences: Arc<dyn PreferenceRepository>,
    /// Workspace directory.
    pub workspaces: Arc<dyn WorkspaceDirectory>,
}

impl Repositories {
    /// Build the backend named in `config.provider`.
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        match config.provider.as_str() {
            "memory" => {
                info!("Using in-memory notification store");
                Ok(Self::in_memory())
            }
            "postgres" => {
                let db = DatabasePool::connect(config).await?;
                if config.run_migrations {
                    run_migrations(&db).await?;
                }
                Ok(Self::postgres(&db))
            }
            other => Err(AppError::configuration(format!(
                "Unknown database provider '{other}'"
            ))),
        }
    }

    /// PostgreSQL-backed repositories sharing one pool.
    pub fn postgres(db: &DatabasePool) -> Self {
        let pool = db.pool().clone();
        Self {
            notifications: Arc::new(PgNotificationRepository::new(pool.clone())),
            preferences: Arc::new(PgPreferenceRepository::new(pool.clone())),
            workspaces: Arc::new(PgWorkspaceDirectory::new(pool)),
        }
    }

    /// Process-local repositories with an empty workspace directory.
    pub fn in_memory() -> Self {
        Self::in_memory_with_directory(Arc::new(MemoryWorkspaceDirectory::new()))
    }

    /// Process-local repositories over a prepared directory.
    pub fn in_memory_with_directory(workspaces: Arc<dyn WorkspaceDirectory>) -> Self {
        Self {
            notifications: Arc::new(MemoryNotificationRepository::new()),
            preferences: Arc::new(MemoryPreferenceRepository::new()),
            workspaces,
        }
    }
}
