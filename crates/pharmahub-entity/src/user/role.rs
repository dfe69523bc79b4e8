//! User role enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Roles carried in verified credentials.
///
/// `SuperAdmin` is a platform operator outside any tenant; the remaining
/// roles are scoped to one workspace and ordered by privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Platform operator.
    SuperAdmin,
    /// Workspace owner.
    Owner,
    /// Licensed pharmacist.
    Pharmacist,
    /// Pharmacy technician.
    Technician,
    /// Intern pharmacist.
    Intern,
    /// Other pharmacy staff.
    Staff,
}

impl UserRole {
    /// Return the privilege level (higher = more privileged).
    pub fn privilege_level(&self) -> u8 {
        match self {
            Self::SuperAdmin => 6,
            Self::Owner => 5,
            Self::Pharmacist => 4,
            Self::Technician => 3,
            Self::Intern => 2,
            Self::Staff => 1,
        }
    }

    /// Check if this role has at least the given role's privileges.
    pub fn has_at_least(&self, other: &UserRole) -> bool {
        self.privilege_level() >= other.privilege_level()
    }

    /// Check if this role is the platform operator.
    pub fn is_platform_admin(&self) -> bool {
        matches!(self, Self::SuperAdmin)
    }

    /// Return the role as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Owner => "owner",
            Self::Pharmacist => "pharmacist",
            Self::Technician => "technician",
            Self::Intern => "intern",
            Self::Staff => "staff",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = pharmahub_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "super_admin" | "superadmin" => Ok(Self::SuperAdmin),
            "owner" => Ok(Self::Owner),
            "pharmacist" => Ok(Self::Pharmacist),
            "technician" => Ok(Self::Technician),
            "intern" => Ok(Self::Intern),
            "staff" => Ok(Self::Staff),
            _ => Err(pharmahub_core::AppError::validation(format!(
                "Invalid user role: '{s}'"
            ))),
        }
    }
}
