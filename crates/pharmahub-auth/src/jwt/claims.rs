//! Claims carried by an access token.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pharmahub_core::types::{UserId, WorkspaceId};
use pharmahub_entity::user::{Identity, UserRole};

/// Access-token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: UserId,
    /// Workspace the token was issued for. Absent for platform operators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wid: Option<WorkspaceId>,
    /// Role at issuance.
    pub role: UserRole,
    /// Issued-at, seconds since epoch.
    pub iat: i64,
    /// Expiry, seconds since epoch.
    pub exp: i64,
    /// Token id.
    pub jti: Uuid,
}

impl Claims {
    /// The verified identity these claims describe.
    pub fn identity(&self) -> Identity {
        Identity::new(self.sub, self.wid, self.role)
    }
}
