//! Verified caller identity.

use serde::{Deserialize, Serialize};

use pharmahub_core::types::{UserId, WorkspaceId};

use super::role::UserRole;

/// The result of verifying a bearer credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Authenticated user.
    pub user_id: UserId,
    /// Workspace the credential was issued for. Platform admins may have none.
    pub workspace_id: Option<WorkspaceId>,
    /// Role at issuance.
    pub role: UserRole,
}

impl Identity {
    /// Create an identity.
    pub fn new(user_id: UserId, workspace_id: Option<WorkspaceId>, role: UserRole) -> Self {
        Self {
            user_id,
            workspace_id,
            role,
        }
    }

    /// Whether this identity bypasses tenant scoping.
    pub fn is_platform_admin(&self) -> bool {
        self.role.is_platform_admin()
    }
}
