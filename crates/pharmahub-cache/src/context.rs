//! Per-process cache of resolved workspace contexts.
//!
//! An entry is served while its age is at most the TTL; older entries are
//! evicted on read and by [`WorkspaceContextCache::sweep`]. The cache is local to one node,
//! so invalidation events must reach every node.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use pharmahub_core::types::{PlanId, UserId, WorkspaceId};
use pharmahub_entity::workspace::WorkspaceContext;

#[derive(Debug, Clone)]
struct Entry {
    context: WorkspaceContext,
    stored_at: Instant,
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ContextCacheStats {
    /// Fresh entries served.
    pub hits: u64,
    /// Lookups that found nothing fresh.
    pub misses: u64,
    /// Entries currently held, stale ones included.
    pub entries: usize,
}

/// TTL-bounded map from user to [`WorkspaceContext`].
#[derive(Debug)]
pub struct WorkspaceContextCache {
    entries: DashMap<UserId, Entry>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl WorkspaceContextCache {
    /// Create an empty cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// The configured TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// A fresh context for `user_id`, evicting a stale one.
    pub fn get(&self, user_id: UserId) -> Option<WorkspaceContext> {
        let now = Instant::now();
        let fresh = self
            .entries
            .get(&user_id)
            .and_then(|e| (now.duration_since(e.stored_at) <= self.ttl).then(|| e.context.clone()));

        match fresh {
            Some(context) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(context)
            }
            None => {
                self.entries
                    .remove_if(&user_id, |_, e| now.duration_since(e.stored_at) > self.ttl);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store `context` for `user_id`, restarting its TTL.
    pub fn set(&self, user_id: UserId, context: WorkspaceContext) {
        self.entries.insert(
            user_id,
            Entry {
                context,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop one user's entry.
    pub fn invalidate(&self, user_id: UserId) -> bool {
        self.entries.remove(&user_id).is_some()
    }

    /// Drop every entry. Returns how many were held.
    pub fn invalidate_all(&self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        debug!(count, "Workspace context cache cleared");
        count
    }

    /// Drop every entry resolved to `workspace_id`.
    pub fn invalidate_workspace(&self, workspace_id: WorkspaceId) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| e.context.workspace_id() != Some(workspace_id));
        before - self.entries.len()
    }

    /// Drop every context whose effective plan is `plan_id`.
    pub fn invalidate_plan(&self, plan_id: PlanId) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| e.context.plan.as_ref().map(|p| p.id) != Some(plan_id));
        before - self.entries.len()
    }

    /// Evict every stale entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now.duration_since(e.stored_at) <= self.ttl);
        before - self.entries.len()
    }

    /// Number of entries held, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current counters.
    pub fn stats(&self) -> ContextCacheStats {
        ContextCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pharmahub_entity::workspace::Workspace;

    fn context_for(workspace_id: WorkspaceId) -> WorkspaceContext {
        let ws = Workspace {
            id: workspace_id,
            name: "Harbor Pharmacy".into(),
            owner_id: UserId::new(),
            plan_id: None,
            trial_end_date: None,
            created_at: Utc::now(),
        };
        WorkspaceContext::derive(&ws, None, None, Utc::now())
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = WorkspaceContextCache::new(Duration::from_secs(300));
        let user = UserId::new();
        cache.set(user, context_for(WorkspaceId::new()));

        tokio::time::advance(Duration::from_secs(300)).await;
        assert!(cache.get(user).is_some(), "still fresh at exactly the TTL");
        assert_eq!(cache.sweep(), 0);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(cache.get(user).is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_restarts_ttl() {
        let cache = WorkspaceContextCache::new(Duration::from_secs(60));
        let user = UserId::new();
        cache.set(user, WorkspaceContext::restricted());
        tokio::time::advance(Duration::from_secs(50)).await;
        cache.set(user, WorkspaceContext::platform_admin());
        tokio::time::advance(Duration::from_secs(50)).await;
        assert_eq!(cache.get(user), Some(WorkspaceContext::platform_admin()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_stale() {
        let cache = WorkspaceContextCache::new(Duration::from_secs(60));
        let (old, new) = (UserId::new(), UserId::new());
        cache.set(old, WorkspaceContext::restricted());
        tokio::time::advance(Duration::from_secs(45)).await;
        cache.set(new, WorkspaceContext::restricted());
        tokio::time::advance(Duration::from_secs(20)).await;

        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(new).is_some());
    }

    #[test]
    fn test_invalidate_workspace_targets_members_only() {
        let cache = WorkspaceContextCache::new(Duration::from_secs(60));
        let (ws_a, ws_b) = (WorkspaceId::new(), WorkspaceId::new());
        let (alice, bob, carol) = (UserId::new(), UserId::new(), UserId::new());
        cache.set(alice, context_for(ws_a));
        cache.set(bob, context_for(ws_a));
        cache.set(carol, context_for(ws_b));

        assert_eq!(cache.invalidate_workspace(ws_a), 2);
        assert!(cache.get(carol).is_some());
        assert!(cache.invalidate(carol));
        assert!(!cache.invalidate(carol));
    }

    #[test]
    fn test_invalidate_all() {
        let cache = WorkspaceContextCache::new(Duration::from_secs(60));
        cache.set(UserId::new(), WorkspaceContext::restricted());
        cache.set(UserId::new(), WorkspaceContext::restricted());
        assert_eq!(cache.invalidate_all(), 2);
        assert!(cache.is_empty());
    }
}
