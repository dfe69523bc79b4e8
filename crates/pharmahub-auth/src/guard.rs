//! Role checks.

use pharmahub_core::error::AppError;
use pharmahub_core::result::AppResult;
use pharmahub_entity::user::{Identity, UserRole};

/// Fail unless `identity` is a platform operator.
pub fn require_platform_admin(identity: &Identity) -> AppResult<()> {
    if identity.is_platform_admin() {
        Ok(())
    } else {
        Err(AppError::authorization("Platform administrator role required"))
    }
}

/// Fail unless `identity` holds at least `minimum`.
pub fn require_role(identity: &Identity, minimum: UserRole) -> AppResult<()> {
    if identity.role.has_at_least(&minimum) {
        Ok(())
    } else {
        Err(AppError::authorization(format!(
            "Role '{}' is below the required '{minimum}'",
            identity.role
        )))
    }
}
