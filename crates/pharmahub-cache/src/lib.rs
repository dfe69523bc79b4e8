//! # pharmahub-cache
//!
//! Two kinds of caching live here:
//!
//! - [`CacheManager`]: a string key/value cache shared between nodes
//!   (Redis) or local to one node (moka), used for unread counters,
//!   preferences, stats snapshots and job locks.
//! - [`WorkspaceContextCache`]: the per-process map of resolved
//!   authorization contexts.

pub mod context;
pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
#[cfg(feature = "redis-backend")]
pub mod redis;

pub use context::WorkspaceContextCache;
pub use provider::CacheManager;
