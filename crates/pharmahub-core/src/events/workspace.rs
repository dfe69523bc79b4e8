//! Workspace, subscription and membership events.

use serde::{Deserialize, Serialize};

use crate::types::{PlanId, UserId, WorkspaceId};

/// Changes to tenant state that invalidate cached workspace contexts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkspaceEvent {
    /// A workspace's subscription status or trial dates changed.
    SubscriptionChanged {
        /// The affected workspace.
        workspace_id: WorkspaceId,
    },
    /// A plan's features or limits were edited.
    PlanChanged {
        /// The edited plan.
        plan_id: PlanId,
    },
    /// A user joined or left a workspace.
    MembershipChanged {
        /// The affected workspace.
        workspace_id: WorkspaceId,
        /// The user whose membership changed.
        user_id: UserId,
    },
    /// A workspace was deleted.
    WorkspaceDeleted {
        /// The deleted workspace.
        workspace_id: WorkspaceId,
    },
    /// A bulk data migration touched tenant state across workspaces.
    BulkMigration,
}

impl WorkspaceEvent {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SubscriptionChanged { .. } => "subscription_changed",
            Self::PlanChanged { .. } => "plan_changed",
            Self::MembershipChanged { .. } => "membership_changed",
            Self::WorkspaceDeleted { .. } => "workspace_deleted",
            Self::BulkMigration => "bulk_migration",
        }
    }
}
