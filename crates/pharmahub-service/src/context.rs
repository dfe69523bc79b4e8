//! Request context carrying the verified identity and its resolved workspace.

use chrono::{DateTime, Utc};
use serde::Serialize;

use pharmahub_core::error::AppError;
use pharmahub_core::types::{UserId, WorkspaceId};
use pharmahub_entity::user::{Identity, UserRole};
use pharmahub_entity::workspace::WorkspaceContext;

/// Context for the current authenticated request.
///
/// Built by the API layer once the token is verified and the workspace
/// context resolved, then passed into service methods so every operation
/// knows who is acting and within which workspace.
#[derive(Debug, Clone, Serialize)]
pub struct RequestContext {
    /// The verified caller.
    pub identity: Identity,
    /// Workspace, subscription and plan view for the caller.
    pub workspace: WorkspaceContext,
    /// When the request was received.
    pub request_time: DateTime<Utc>,
}

impl RequestContext {
    /// Creates a new request context.
    pub fn new(identity: Identity, workspace: WorkspaceContext) -> Self {
        Self {
            identity,
            workspace,
            request_time: Utc::now(),
        }
    }

    /// The caller's user id.
    pub fn user_id(&self) -> UserId {
        self.identity.user_id
    }

    /// The caller's role.
    pub fn role(&self) -> UserRole {
        self.identity.role
    }

    /// Returns whether the caller is a platform administrator.
    pub fn is_platform_admin(&self) -> bool {
        self.identity.is_platform_admin()
    }

    /// The workspace the caller acts in.
    ///
    /// A workspace carried in the token wins over the resolved one.
    pub fn workspace_id(&self) -> Option<WorkspaceId> {
        self.identity
            .workspace_id
            .or_else(|| self.workspace.workspace_id())
    }

    /// Like [`Self::workspace_id`], failing when the caller has none.
    pub fn require_workspace(&self) -> Result<WorkspaceId, AppError> {
        self.workspace_id()
            .ok_or_else(|| AppError::authorization("No workspace is associated with this user"))
    }
}
