//! Resolves the workspace context of an authenticated caller.
//!
//! Flow: platform admins get a synthetic context without touching the
//! cache. Everyone else is served from [`WorkspaceContextCache`] when
//! fresh; on a miss the workspace, subscription and plan are looked up,
//! the context is derived and cached. A failed lookup yields the
//! restrictive context and is not cached.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use pharmahub_cache::WorkspaceContextCache;
use pharmahub_cache::context::ContextCacheStats;
use pharmahub_core::events::WorkspaceEvent;
use pharmahub_core::result::AppResult;
use pharmahub_core::types::UserId;
use pharmahub_database::WorkspaceDirectory;
use pharmahub_entity::user::Identity;
use pharmahub_entity::workspace::WorkspaceContext;

/// Cache-fronted workspace context lookup.
pub struct WorkspaceContextResolver {
    directory: Arc<dyn WorkspaceDirectory>,
    cache: Arc<WorkspaceContextCache>,
}

impl WorkspaceContextResolver {
    /// Creates a new resolver.
    pub fn new(directory: Arc<dyn WorkspaceDirectory>, cache: Arc<WorkspaceContextCache>) -> Self {
        Self { directory, cache }
    }

    /// The underlying cache.
    pub fn cache(&self) -> &Arc<WorkspaceContextCache> {
        &self.cache
    }

    /// Context for `identity`. Never fails.
    pub async fn resolve(&self, identity: &Identity) -> WorkspaceContext {
        self.resolve_at(identity, Utc::now()).await
    }

    /// [`Self::resolve`] with an explicit clock for trial evaluation.
    pub async fn resolve_at(&self, identity: &Identity, now: DateTime<Utc>) -> WorkspaceContext {
        if identity.is_platform_admin() {
            return WorkspaceContext::platform_admin();
        }
        if let Some(context) = self.cache.get(identity.user_id) {
            return context;
        }

        match self.lookup(identity.user_id, now).await {
            Ok(context) => {
                self.cache.set(identity.user_id, context.clone());
                context
            }
            Err(e) => {
                warn!(
                    user_id = %identity.user_id,
                    error = %e,
                    "Workspace context lookup failed; using restricted context"
                );
                WorkspaceContext::restricted()
            }
        }
    }

    async fn lookup(&self, user_id: UserId, now: DateTime<Utc>) -> AppResult<WorkspaceContext> {
        let Some(workspace) = self.directory.find_workspace_for_user(user_id).await? else {
            debug!(%user_id, "User has no workspace");
            return Ok(WorkspaceContext::restricted());
        };
        let subscription = self.directory.find_subscription(workspace.id).await?;

        let mut plan = match &subscription {
            Some(sub) => self.directory.find_plan(sub.plan_id).await?,
            None => None,
        };
        if plan.is_none()
            && let Some(plan_id) = workspace.plan_id
        {
            plan = self.directory.find_plan(plan_id).await?;
        }

        Ok(WorkspaceContext::derive(
            &workspace,
            subscription.as_ref(),
            plan.as_ref(),
            now,
        ))
    }

    /// Drop one user's cached context.
    pub fn invalidate_user(&self, user_id: UserId) -> bool {
        self.cache.invalidate(user_id)
    }

    /// Drop every cached context.
    pub fn invalidate_all(&self) -> usize {
        self.cache.invalidate_all()
    }

    /// Apply a workspace change. Returns how many entries were dropped.
    pub fn apply_event(&self, event: &WorkspaceEvent) -> usize {
        let dropped = match event {
            WorkspaceEvent::SubscriptionChanged { workspace_id }
            | WorkspaceEvent::WorkspaceDeleted { workspace_id } => {
                self.cache.invalidate_workspace(*workspace_id)
            }
            WorkspaceEvent::PlanChanged { plan_id } => self.cache.invalidate_plan(*plan_id),
            WorkspaceEvent::MembershipChanged {
                workspace_id,
                user_id,
            } => {
                debug!(%workspace_id, %user_id, "Membership changed");
                usize::from(self.cache.invalidate(*user_id))
            }
            WorkspaceEvent::BulkMigration => self.cache.invalidate_all(),
        };
        info!(event = event.name(), dropped, "Workspace context invalidated");
        dropped
    }

    /// Evict stale entries.
    pub fn sweep(&self) -> usize {
        let evicted = self.cache.sweep();
        if evicted > 0 {
            debug!(evicted, "Workspace context cache swept");
        }
        evicted
    }

    /// Cache counters.
    pub fn stats(&self) -> ContextCacheStats {
        self.cache.stats()
    }
}

impl std::fmt::Debug for WorkspaceContextResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceContextResolver")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
