//! Authorization context derived from a user's workspace, subscription and plan.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pharmahub_core::types::{PlanId, SubscriptionId, UserId, WorkspaceId};

use super::limits::PlanLimits;
use super::model::{Plan, Subscription, SubscriptionStatus, Workspace};

/// Permission granting everything.
pub const WILDCARD_PERMISSION: &str = "*";

/// Reference to the user's workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceRef {
    /// Workspace id.
    pub id: WorkspaceId,
    /// Display name.
    pub name: String,
    /// Owning user.
    pub owner_id: UserId,
    /// Trial end recorded on the workspace.
    pub trial_end_date: Option<DateTime<Utc>>,
}

/// Reference to the workspace's subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRef {
    /// Subscription id.
    pub id: SubscriptionId,
    /// Billing state.
    pub status: SubscriptionStatus,
    /// Trial end recorded on the subscription.
    pub trial_end_date: Option<DateTime<Utc>>,
}

/// Reference to the effective plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRef {
    /// Plan id.
    pub id: PlanId,
    /// Display name.
    pub name: String,
}

/// Cached per-user authorization context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceContext {
    /// The user's workspace. `None` for platform admins and unaffiliated users.
    pub workspace: Option<WorkspaceRef>,
    /// The workspace's current subscription.
    pub subscription: Option<SubscriptionRef>,
    /// The effective plan.
    pub plan: Option<PlanRef>,
    /// Granted permission strings.
    pub permissions: BTreeSet<String>,
    /// Resource limits of the effective plan.
    pub limits: PlanLimits,
    /// Either trial end date lies in the past.
    pub is_trial_expired: bool,
    /// Subscription is trial or active.
    pub is_subscription_active: bool,
}

impl WorkspaceContext {
    /// Fail-closed context: no permissions, zero limits, inactive.
    pub fn restricted() -> Self {
        Self {
            workspace: None,
            subscription: None,
            plan: None,
            permissions: BTreeSet::new(),
            limits: PlanLimits::default(),
            is_trial_expired: true,
            is_subscription_active: false,
        }
    }

    /// Synthetic all-access context for platform operators.
    pub fn platform_admin() -> Self {
        Self {
            workspace: None,
            subscription: None,
            plan: None,
            permissions: BTreeSet::from([WILDCARD_PERMISSION.to_string()]),
            limits: PlanLimits::unlimited(),
            is_trial_expired: false,
            is_subscription_active: true,
        }
    }

    /// Derive the context from the looked-up records.
    ///
    /// `plan` is the subscription's plan, or the workspace's direct plan
    /// when there is no subscription. Limits come from the plan whenever one
    /// resolved; permissions are granted only while the subscription is
    /// active.
    pub fn derive(
        workspace: &Workspace,
        subscription: Option<&Subscription>,
        plan: Option<&Plan>,
        now: DateTime<Utc>,
    ) -> Self {
        // The two trial dates are not reconciled upstream; either one in the past expires the trial.
        let is_trial_expired = workspace.trial_end_date.is_some_and(|end| end < now)
            || subscription
                .and_then(|s| s.trial_end_date)
                .is_some_and(|end| end < now);
        let is_subscription_active = subscription.is_some_and(|s| s.status.is_active());

        let permissions = match plan {
            Some(plan) if is_subscription_active => plan.features.iter().cloned().collect(),
            _ => BTreeSet::new(),
        };

        Self {
            workspace: Some(WorkspaceRef {
                id: workspace.id,
                name: workspace.name.clone(),
                owner_id: workspace.owner_id,
                trial_end_date: workspace.trial_end_date,
            }),
            subscription: subscription.map(|s| SubscriptionRef {
                id: s.id,
                status: s.status,
                trial_end_date: s.trial_end_date,
            }),
            plan: plan.map(|p| PlanRef {
                id: p.id,
                name: p.name.clone(),
            }),
            permissions,
            limits: plan.map(|p| p.limits).unwrap_or_default(),
            is_trial_expired,
            is_subscription_active,
        }
    }

    /// Workspace id, if any.
    pub fn workspace_id(&self) -> Option<WorkspaceId> {
        self.workspace.as_ref().map(|w| w.id)
    }

    /// Whether `permission` is granted, directly or by wildcard.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(WILDCARD_PERMISSION) || self.permissions.contains(permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::limits::Limit;
    use chrono::Duration;

    fn workspace(trial_end: Option<DateTime<Utc>>) -> Workspace {
        Workspace {
            id: WorkspaceId::new(),
            name: "Main Street Pharmacy".into(),
            owner_id: UserId::new(),
            plan_id: None,
            trial_end_date: trial_end,
            created_at: Utc::now(),
        }
    }

    fn subscription(ws: &Workspace, status: SubscriptionStatus, trial_end: Option<DateTime<Utc>>) -> Subscription {
        Subscription {
            id: SubscriptionId::new(),
            workspace_id: ws.id,
            plan_id: PlanId::new(),
            status,
            trial_end_date: trial_end,
            current_period_end: None,
            created_at: Utc::now(),
        }
    }

    fn plan() -> Plan {
        Plan {
            id: PlanId::new(),
            name: "Professional".into(),
            features: vec!["patients:write".into(), "messaging".into()],
            limits: PlanLimits {
                patients: Limit::Count(1000),
                ..PlanLimits::unlimited()
            },
        }
    }

    #[test]
    fn test_active_subscription_grants_plan_features() {
        let now = Utc::now();
        let ws = workspace(None);
        let sub = subscription(&ws, SubscriptionStatus::Active, None);
        let ctx = WorkspaceContext::derive(&ws, Some(&sub), Some(&plan()), now);
        assert!(ctx.is_subscription_active);
        assert!(!ctx.is_trial_expired);
        assert!(ctx.has_permission("messaging"));
        assert!(!ctx.has_permission("billing:admin"));
        assert_eq!(ctx.limits.patients, Limit::Count(1000));
    }

    #[test]
    fn test_either_trial_date_in_past_expires() {
        let now = Utc::now();
        let past = Some(now - Duration::days(1));
        let future = Some(now + Duration::days(1));

        let ws = workspace(past);
        let sub = subscription(&ws, SubscriptionStatus::Trial, future);
        assert!(WorkspaceContext::derive(&ws, Some(&sub), None, now).is_trial_expired);

        let ws = workspace(future);
        let sub = subscription(&ws, SubscriptionStatus::Trial, past);
        assert!(WorkspaceContext::derive(&ws, Some(&sub), None, now).is_trial_expired);

        let ws = workspace(future);
        let sub = subscription(&ws, SubscriptionStatus::Trial, future);
        assert!(!WorkspaceContext::derive(&ws, Some(&sub), None, now).is_trial_expired);
    }

    #[test]
    fn test_past_due_is_inactive_without_permissions() {
        let ws = workspace(None);
        let sub = subscription(&ws, SubscriptionStatus::PastDue, None);
        let ctx = WorkspaceContext::derive(&ws, Some(&sub), Some(&plan()), Utc::now());
        assert!(!ctx.is_subscription_active);
        assert!(ctx.permissions.is_empty());
        assert!(ctx.plan.is_some());
    }

    #[test]
    fn test_platform_admin_wildcard() {
        let ctx = WorkspaceContext::platform_admin();
        assert!(ctx.has_permission("anything:at_all"));
        assert_eq!(ctx.limits, PlanLimits::unlimited());
        assert!(!WorkspaceContext::restricted().has_permission("messaging"));
    }
}
