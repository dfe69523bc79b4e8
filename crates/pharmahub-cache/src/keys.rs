//! Cache key builders.
//!
//! Every key the application writes is built here. Backends add their own
//! namespace prefix on top.

use pharmahub_core::types::{UserId, WorkspaceId};

/// Cached unread count of a user in one workspace.
pub fn unread_count(user_id: UserId, workspace_id: WorkspaceId) -> String {
    format!("notif:unread:{user_id}:{workspace_id}")
}

/// Prefix covering every cached unread count of a user.
pub fn unread_count_prefix(user_id: UserId) -> String {
    format!("notif:unread:{user_id}:")
}

/// Cached notification preferences of a user.
pub fn preferences(user_id: UserId) -> String {
    format!("notif:prefs:{user_id}")
}

/// Latest notification stats snapshot.
pub fn stats_snapshot() -> String {
    "notif:stats".to_string()
}

/// Cross-node lock held while a scheduled job runs.
pub fn job_lock(job_id: &str) -> String {
    format!("lock:job:{job_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (UserId, WorkspaceId) {
        (
            "00000000-0000-0000-0000-000000000001".parse().expect("uuid"),
            "00000000-0000-0000-0000-000000000002".parse().expect("uuid"),
        )
    }

    #[test]
    fn test_unread_key_shares_user_prefix() {
        let (user, ws) = ids();
        let key = unread_count(user, ws);
        assert_eq!(
            key,
            "notif:unread:00000000-0000-0000-0000-000000000001:00000000-0000-0000-0000-000000000002"
        );
        assert!(key.starts_with(&unread_count_prefix(user)));
    }

    #[test]
    fn test_job_lock_key() {
        assert_eq!(job_lock("retry-failed"), "lock:job:retry-failed");
    }
}
