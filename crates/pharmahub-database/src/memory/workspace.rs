use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use pharmahub_core::result::AppResult;
use pharmahub_core::types::{PlanId, UserId, WorkspaceId};
use pharmahub_entity::workspace::{Plan, Subscription, Workspace};

use crate::repositories::WorkspaceDirectory;

/// Workspace directory seeded by hand.
///
/// Counts workspace lookups so callers can observe cache behaviour.
#[derive(Debug, Default)]
pub struct MemoryWorkspaceDirectory {
    workspaces: DashMap<WorkspaceId, Workspace>,
    members: DashMap<WorkspaceId, Vec<UserId>>,
    subscriptions: DashMap<WorkspaceId, Subscription>,
    plans: DashMap<PlanId, Plan>,
    lookups: AtomicU64,
}

impl MemoryWorkspaceDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a workspace.
    pub fn put_workspace(&self, workspace: Workspace) {
        self.workspaces.insert(workspace.id, workspace);
    }

    /// Remove a workspace with its memberships and subscription.
    pub fn remove_workspace(&self, workspace_id: WorkspaceId) {
        self.workspaces.remove(&workspace_id);
        self.members.remove(&workspace_id);
        self.subscriptions.remove(&workspace_id);
    }

    /// Add a member. Memberships keep insertion order.
    pub fn add_member(&self, workspace_id: WorkspaceId, user_id: UserId) {
        let mut members = self.members.entry(workspace_id).or_default();
        if !members.contains(&user_id) {
            members.push(user_id);
        }
    }

    /// Remove a member.
    pub fn remove_member(&self, workspace_id: WorkspaceId, user_id: UserId) {
        if let Some(mut members) = self.members.get_mut(&workspace_id) {
            members.retain(|m| *m != user_id);
        }
    }

    /// Set the workspace's current subscription.
    pub fn put_subscription(&self, subscription: Subscription) {
        self.subscriptions
            .insert(subscription.workspace_id, subscription);
    }

    /// Add or replace a plan.
    pub fn put_plan(&self, plan: Plan) {
        self.plans.insert(plan.id, plan);
    }

    /// Number of workspace lookups served.
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl WorkspaceDirectory for MemoryWorkspaceDirectory {
    async fn find_workspace_for_user(&self, user_id: UserId) -> AppResult<Option<Workspace>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);

        let mut owned: Vec<Workspace> = self
            .workspaces
            .iter()
            .filter(|w| w.owner_id == user_id)
            .map(|w| w.value().clone())
            .collect();
        if !owned.is_empty() {
            owned.sort_by_key(|w| w.created_at);
            return Ok(owned.into_iter().next());
        }

        let mut joined: Vec<Workspace> = self
            .members
            .iter()
            .filter(|m| m.value().contains(&user_id))
            .filter_map(|m| self.workspaces.get(m.key()).map(|w| w.value().clone()))
            .collect();
        joined.sort_by_key(|w| w.created_at);
        Ok(joined.into_iter().next())
    }

    async fn find_subscription(
        &self,
        workspace_id: WorkspaceId,
    ) -> AppResult<Option<Subscription>> {
        Ok(self
            .subscriptions
            .get(&workspace_id)
            .map(|s| s.value().clone()))
    }

    async fn find_plan(&self, plan_id: PlanId) -> AppResult<Option<Plan>> {
        Ok(self.plans.get(&plan_id).map(|p| p.value().clone()))
    }

    async fn find_member_ids(&self, workspace_id: WorkspaceId) -> AppResult<Vec<UserId>> {
        let mut ids = Vec::new();
        if let Some(w) = self.workspaces.get(&workspace_id) {
            ids.push(w.owner_id);
        }
        if let Some(members) = self.members.get(&workspace_id) {
            for m in members.iter() {
                if !ids.contains(m) {
                    ids.push(*m);
                }
            }
        }
        Ok(ids)
    }
}
