//! Workspace, subscription and plan records.
//!
//! The notification core only reads these. Mutations happen in the billing
//! and membership services, which raise a `WorkspaceEvent` afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use pharmahub_core::types::{PlanId, SubscriptionId, UserId, WorkspaceId};

use super::limits::PlanLimits;

/// A pharmacy tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Workspace {
    /// Workspace id.
    pub id: WorkspaceId,
    /// Display name.
    pub name: String,
    /// Owning user.
    pub owner_id: UserId,
    /// Plan attached directly to the workspace, used when no subscription exists.
    pub plan_id: Option<PlanId>,
    /// Trial end recorded on the workspace.
    pub trial_end_date: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Billing state of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// In a free trial.
    Trial,
    /// Paid and current.
    Active,
    /// Payment overdue.
    PastDue,
    /// Cancelled by the customer.
    Canceled,
    /// Lapsed.
    Expired,
}

impl SubscriptionStatus {
    /// Only trial and active subscriptions grant access.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Trial | Self::Active)
    }
}

/// A workspace's subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    /// Subscription id.
    pub id: SubscriptionId,
    /// Subscribed workspace.
    pub workspace_id: WorkspaceId,
    /// Subscribed plan.
    pub plan_id: PlanId,
    /// Billing state.
    pub status: SubscriptionStatus,
    /// Trial end recorded on the subscription.
    pub trial_end_date: Option<DateTime<Utc>>,
    /// End of the current billing period.
    pub current_period_end: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A subscription plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Plan id.
    pub id: PlanId,
    /// Display name.
    pub name: String,
    /// Feature flags, used as permission strings.
    pub features: Vec<String>,
    /// Resource limits.
    pub limits: PlanLimits,
}
