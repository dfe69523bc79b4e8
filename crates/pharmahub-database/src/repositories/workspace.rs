//! PostgreSQL view of the workspace directory.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use pharmahub_core::error::{AppError, ErrorKind};
use pharmahub_core::result::AppResult;
use pharmahub_core::types::{PlanId, UserId, WorkspaceId};
use pharmahub_entity::workspace::{Plan, PlanLimits, Subscription, Workspace};

use super::WorkspaceDirectory;

#[derive(Debug, FromRow)]
struct PlanRow {
    id: PlanId,
    name: String,
    features: Vec<String>,
    limits: Json<PlanLimits>,
}

/// Read-only queries against the billing and membership tables.
#[derive(Debug, Clone)]
pub struct PgWorkspaceDirectory {
    pool: PgPool,
}

impl PgWorkspaceDirectory {
    /// Create a directory over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkspaceDirectory for PgWorkspaceDirectory {
    async fn find_workspace_for_user(&self, user_id: UserId) -> AppResult<Option<Workspace>> {
        // Owned workspaces sort ahead of memberships.
        sqlx::query_as::<_, Workspace>(
            "SELECT w.id, w.name, w.owner_id, w.plan_id, w.trial_end_date, w.created_at \
             FROM workspaces w \
             LEFT JOIN workspace_members m ON m.workspace_id = w.id AND m.user_id = $1 \
             WHERE w.owner_id = $1 OR m.user_id IS NOT NULL \
             ORDER BY (w.owner_id = $1) DESC, m.joined_at NULLS LAST, w.created_at \
             LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Workspace lookup failed", e))
    }

    async fn find_subscription(
        &self,
        workspace_id: WorkspaceId,
    ) -> AppResult<Option<Subscription>> {
        sqlx::query_as::<_, Subscription>(
            "SELECT id, workspace_id, plan_id, status, trial_end_date, current_period_end, created_at \
             FROM subscriptions WHERE workspace_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(workspace_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Subscription lookup failed", e))
    }

    async fn find_plan(&self, plan_id: PlanId) -> AppResult<Option<Plan>> {
        let row = sqlx::query_as::<_, PlanRow>(
            "SELECT id, name, features, limits FROM plans WHERE id = $1",
        )
        .bind(plan_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Plan lookup failed", e))?;

        Ok(row.map(|r| Plan {
            id: r.id,
            name: r.name,
            features: r.features,
            limits: r.limits.0,
        }))
    }

    async fn find_member_ids(&self, workspace_id: WorkspaceId) -> AppResult<Vec<UserId>> {
        sqlx::query_scalar::<_, UserId>(
            "SELECT owner_id FROM workspaces WHERE id = $1 \
             UNION SELECT user_id FROM workspace_members WHERE workspace_id = $1",
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Member lookup failed", e))
    }
}
