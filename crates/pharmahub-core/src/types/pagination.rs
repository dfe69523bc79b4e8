//! Limit/offset pagination types for list endpoints.

use serde::{Deserialize, Serialize};

/// Default number of items returned when no limit is supplied.
pub const DEFAULT_LIMIT: u64 = 20;
/// Hard upper bound on the page size.
pub const MAX_LIMIT: u64 = 100;
/// Largest offset SQL accepts.
pub const MAX_OFFSET: u64 = i64::MAX as u64;

/// Request parameters for paginated queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Maximum number of items to return.
    #[serde(default = "default_limit")]
    pub limit: u64,
    /// Number of items to skip.
    #[serde(default)]
    pub offset: u64,
}

impl PageRequest {
    /// Create a page request, clamping the limit into `1..=max_limit` and
    /// the offset to [`MAX_OFFSET`].
    pub fn new(limit: u64, offset: u64, max_limit: u64) -> Self {
        Self {
            limit: limit.clamp(1, max_limit.max(1)),
            offset: offset.min(MAX_OFFSET),
        }
    }

    /// Return the SQL `LIMIT` value.
    pub fn limit(&self) -> i64 {
        i64::try_from(self.limit).unwrap_or(i64::MAX)
    }

    /// Return the SQL `OFFSET` value.
    pub fn offset(&self) -> i64 {
        i64::try_from(self.offset).unwrap_or(i64::MAX)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

/// A page of results along with the total number of matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    /// The items on this page.
    pub items: Vec<T>,
    /// Total number of items matching the query, ignoring pagination.
    pub total: u64,
    /// Limit used for this page.
    pub limit: u64,
    /// Offset used for this page.
    pub offset: u64,
}

impl<T> Page<T> {
    /// Create a new page.
    pub fn new(items: Vec<T>, total: u64, request: &PageRequest) -> Self {
        Self {
            items,
            total,
            limit: request.limit,
            offset: request.offset,
        }
    }

    /// Whether more items exist after this page.
    pub fn has_more(&self) -> bool {
        self.offset.saturating_add(self.items.len() as u64) < self.total
    }
}

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}
